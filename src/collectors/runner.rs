use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collectors::JobCollector;
use crate::collectors::run_state::RunState;
use crate::error::StorageError;
use crate::models::job::CreateJob;
use crate::models::run_stats::{RunStats, ScraperStatus};
use crate::store::JobStore;

struct Inner {
    collectors: Vec<Arc<dyn JobCollector>>,
    store: Arc<dyn JobStore>,
    state: RunState,
    queue_capacity: usize,
}

/// Drives one run across all collectors at a time. Cheap to clone; clones
/// share the same collectors, store and status.
#[derive(Clone)]
pub struct ScrapeRunner {
    inner: Arc<Inner>,
}

impl ScrapeRunner {
    pub fn new(
        collectors: Vec<Arc<dyn JobCollector>>,
        store: Arc<dyn JobStore>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                collectors,
                store,
                state: RunState::new(),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    pub fn status(&self) -> ScraperStatus {
        self.inner.state.snapshot()
    }

    /// Start a run in the background. Returns false without doing anything
    /// when a run is already in progress.
    pub fn start_run(&self) -> bool {
        if !self.inner.state.begin() {
            tracing::debug!("Scrape already running, ignoring trigger");
            return false;
        }
        let runner = self.clone();
        tokio::spawn(async move {
            runner.execute().await;
        });
        true
    }

    /// Run to completion in the current task. Returns None when a run is
    /// already in progress.
    pub async fn run(&self) -> Option<RunStats> {
        if !self.inner.state.begin() {
            tracing::debug!("Scrape already running, ignoring trigger");
            return None;
        }
        Some(self.execute().await)
    }

    /// Body of a run; the caller must have won `RunState::begin`.
    async fn execute(&self) -> RunStats {
        let ran_at = Utc::now();
        let mut guard = PublishGuard::new(&self.inner.state, ran_at);

        tracing::info!(
            "Starting job scraping from {} sources",
            self.inner.collectors.len()
        );

        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        let persist = tokio::spawn(persist_jobs(Arc::clone(&self.inner.store), rx));

        let producers: Vec<(String, JoinHandle<bool>)> = self
            .inner
            .collectors
            .iter()
            .map(|collector| {
                let name = collector.name().to_string();
                let handle = tokio::spawn(produce(Arc::clone(collector), tx.clone()));
                (name, handle)
            })
            .collect();
        drop(tx);

        let mut stats = RunStats::empty(ran_at);
        for (name, handle) in producers {
            match handle.await {
                Ok(true) => stats.succeeded_sources.push(name),
                Ok(false) => stats.failed_sources.push(name),
                Err(e) => {
                    tracing::error!("Scraper {name} aborted: {e}");
                    stats.failed_sources.push(name);
                }
            }
        }

        stats.jobs_saved = match persist.await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!("Persisting task aborted: {e}");
                0
            }
        };

        tracing::info!(
            "Scraping completed: {} jobs saved, {} sources succeeded, {} failed",
            stats.jobs_saved,
            stats.succeeded_sources.len(),
            stats.failed_sources.len()
        );

        guard.publish(stats.clone());
        stats
    }
}

/// Returns the status to idle even if a run is dropped or panics before it
/// publishes its own stats.
struct PublishGuard<'a> {
    state: &'a RunState,
    ran_at: DateTime<Utc>,
    published: bool,
}

impl<'a> PublishGuard<'a> {
    fn new(state: &'a RunState, ran_at: DateTime<Utc>) -> Self {
        Self {
            state,
            ran_at,
            published: false,
        }
    }

    fn publish(&mut self, stats: RunStats) {
        self.state.publish(stats);
        self.published = true;
    }
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            tracing::warn!("Run ended without publishing stats");
            self.state.publish(RunStats::empty(self.ran_at));
        }
    }
}

/// Collect from one source and queue its records in order. Returns whether
/// the source succeeded.
async fn produce(collector: Arc<dyn JobCollector>, tx: mpsc::Sender<CreateJob>) -> bool {
    let name = collector.name().to_string();
    match collector.collect().await {
        Ok(jobs) => {
            tracing::info!("Scraper {name} found {} jobs", jobs.len());
            for job in jobs {
                if tx.send(job).await.is_err() {
                    tracing::warn!("Job queue closed while {name} was still sending");
                    break;
                }
            }
            true
        }
        Err(e) => {
            tracing::warn!("Scraper {name} failed: {e}");
            false
        }
    }
}

/// Drain the queue, inserting every valid job not already stored. Returns the
/// number of inserted rows.
async fn persist_jobs(store: Arc<dyn JobStore>, mut rx: mpsc::Receiver<CreateJob>) -> usize {
    let mut saved = 0;

    while let Some(job) = rx.recv().await {
        if !job.is_valid() {
            tracing::debug!("Skipping job without title or company from {}", job.source_site);
            continue;
        }

        if let Some(key) = job.dedup_key() {
            match store.exists(key).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to check for existing job {key}: {e}");
                    continue;
                }
            }
        }

        match store.insert(&job).await {
            Ok(row) => {
                saved += 1;
                tracing::debug!(id = %row.id, source = %job.source_site, "Saved job '{}'", row.title);
            }
            Err(StorageError::Conflict(url)) => {
                tracing::debug!("Job {url} was stored concurrently, skipping");
            }
            Err(e) => {
                tracing::warn!("Failed to save job '{}': {e}", job.title);
            }
        }
    }

    saved
}

/// Periodic trigger: optionally run once immediately, then every `every`,
/// until Ctrl-C. Run failures never stop the loop.
pub async fn run_scheduler(runner: ScrapeRunner, every: Duration, run_immediately: bool) {
    let every = every.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !run_immediately {
        // The first tick of an interval completes at once.
        ticker.tick().await;
    }

    tracing::info!("Scheduler started, running every {}s", every.as_secs());

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping scheduler");
                break;
            }
            _ = async {
                ticker.tick().await;
                tracing::info!("Running scheduled job scraping");
                match runner.run().await {
                    Some(stats) => tracing::info!(
                        "Scheduled scraping finished: {} saved, failed sources: {:?}",
                        stats.jobs_saved,
                        stats.failed_sources
                    ),
                    None => tracing::info!("A run is already in progress, skipping this tick"),
                }
            } => {}
        }
    }
}
