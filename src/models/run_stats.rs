use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one complete run across every registered collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub ran_at: DateTime<Utc>,
    pub jobs_saved: usize,
    pub succeeded_sources: Vec<String>,
    pub failed_sources: Vec<String>,
}

impl RunStats {
    pub fn empty(ran_at: DateTime<Utc>) -> Self {
        Self {
            ran_at,
            jobs_saved: 0,
            succeeded_sources: Vec::new(),
            failed_sources: Vec::new(),
        }
    }
}

/// Status view returned to callers polling the scraper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScraperStatus {
    pub is_running: bool,
    pub last_run: DateTime<Utc>,
    pub jobs_scraped: usize,
    pub successful_sites: Vec<String>,
    pub failed_sites: Vec<String>,
}
