use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::models::run_stats::{RunStats, ScraperStatus};

struct Inner {
    is_running: bool,
    last_run: DateTime<Utc>,
    stats: Option<RunStats>,
}

/// Shared run status. Every field is read and written under one lock, so a
/// reader sees either the previous run's stats or the new ones, never a mix.
pub struct RunState {
    inner: Mutex<Inner>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                is_running: false,
                last_run: Utc::now(),
                stats: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the running state. Returns false if a run is already active.
    pub fn begin(&self) -> bool {
        let mut inner = self.lock();
        if inner.is_running {
            return false;
        }
        inner.is_running = true;
        true
    }

    /// Publish a finished run's stats and return to idle.
    pub fn publish(&self, stats: RunStats) {
        let mut inner = self.lock();
        inner.is_running = false;
        inner.last_run = Utc::now();
        inner.stats = Some(stats);
    }

    pub fn snapshot(&self) -> ScraperStatus {
        let inner = self.lock();
        let (jobs_scraped, successful_sites, failed_sites) = match &inner.stats {
            Some(stats) => (
                stats.jobs_saved,
                stats.succeeded_sources.clone(),
                stats.failed_sources.clone(),
            ),
            None => (0, Vec::new(), Vec::new()),
        };

        ScraperStatus {
            is_running: inner.is_running,
            last_run: inner.last_run,
            jobs_scraped,
            successful_sites,
            failed_sites,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
