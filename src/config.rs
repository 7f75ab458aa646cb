use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "job-ingest", about = "Scheduled job posting ingestion service")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Capacity of the queue between collectors and the persisting task
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "1000", value_parser = clap::value_parser!(u32).range(1..))]
    pub queue_capacity: u32,

    /// User-Agent sent by the feed collectors
    #[arg(
        long,
        env = "SCRAPER_USER_AGENT",
        default_value = "Mozilla/5.0 (compatible; JobIngestBot/1.0)"
    )]
    pub user_agent: String,

    /// Per-request timeout for every collector fetch
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    pub fetch_timeout_secs: u64,

    /// Search keywords for the LinkedIn listing page
    #[arg(long, env = "LINKEDIN_KEYWORDS", default_value = "software engineer")]
    pub linkedin_keywords: String,

    /// Search location for the LinkedIn listing page
    #[arg(long, env = "LINKEDIN_LOCATION", default_value = "Worldwide")]
    pub linkedin_location: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP trigger surface and the background scheduler (default)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,

        /// Seconds between scheduled runs
        #[arg(long, env = "SCRAPE_INTERVAL_SECS", default_value = "21600")]
        scrape_interval_secs: u64,

        /// Wait for the first interval instead of running immediately
        #[arg(long, env = "SKIP_INITIAL_RUN", default_value = "false")]
        skip_initial_run: bool,
    },
    /// Perform a single run in the foreground and print its stats
    RunOnce,
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or_else(|| Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            scrape_interval_secs: std::env::var("SCRAPE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(21_600),
            skip_initial_run: std::env::var("SKIP_INITIAL_RUN")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
