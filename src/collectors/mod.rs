// Source collectors and the runner that drives them.

pub mod linkedin;
pub mod remoteok;
pub mod run_state;
pub mod runner;
pub mod weworkremotely;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use scraper::Html;

use crate::config::Config;
use crate::error::ScrapeError;
use crate::models::job::CreateJob;

/// Trait that all job collectors must implement.
/// Each collector fetches postings from one external source and returns them
/// as canonical records ready for deduplication and insertion.
#[async_trait]
pub trait JobCollector: Send + Sync {
    /// Name reported in run stats.
    fn name(&self) -> &str;

    /// Fetch and normalize postings. Fails only when the whole batch is
    /// unusable; malformed entries are dropped from the result instead.
    async fn collect(&self) -> Result<Vec<CreateJob>, ScrapeError>;
}

/// The fixed set of sources, in the order their results are reported.
pub fn default_collectors(config: &Config) -> Result<Vec<Arc<dyn JobCollector>>, ScrapeError> {
    let timeout = config.fetch_timeout();
    let feed_client = http_client(&config.user_agent, timeout)?;
    let browser_client = http_client(linkedin::BROWSER_USER_AGENT, timeout)?;

    let collectors: Vec<Arc<dyn JobCollector>> = vec![
        Arc::new(remoteok::RemoteOk::new(feed_client.clone())),
        Arc::new(weworkremotely::WeWorkRemotely::new(feed_client)),
        Arc::new(linkedin::LinkedIn::new(
            browser_client,
            &config.linkedin_keywords,
            &config.linkedin_location,
        )),
    ];
    Ok(collectors)
}

pub fn http_client(user_agent: &str, timeout: Duration) -> Result<Client, ScrapeError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(ScrapeError::Client)
}

/// Send a prepared request and return the body of a successful response.
async fn fetch_text(source_name: &'static str, request: RequestBuilder) -> Result<String, ScrapeError> {
    let resp = request
        .send()
        .await
        .map_err(|error| ScrapeError::Transport { source_name, error })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::Status { source_name, status });
    }

    resp.text()
        .await
        .map_err(|error| ScrapeError::Transport { source_name, error })
}

/// Plain text of an HTML snippet: tags removed, entities decoded, whitespace
/// collapsed. Snippets that were escaped twice are decoded a second time.
pub fn strip_markup(raw: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"</?[A-Za-z!][^>]*>").expect("static tag regex is valid"));

    let text = fragment_text(raw);
    if tag.is_match(&text) {
        fragment_text(&text)
    } else {
        text
    }
}

fn fragment_text(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let pieces: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&pieces.join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
