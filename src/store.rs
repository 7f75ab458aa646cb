use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StorageError;
use crate::models::job::{CreateJob, Job};

/// Persistence contract consumed by the runner.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Whether a job with this source url has already been stored.
    async fn exists(&self, source_url: &str) -> Result<bool, StorageError>;

    /// Store a new job, returning it with its assigned identity.
    async fn insert(&self, job: &CreateJob) -> Result<Job, StorageError>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn exists(&self, source_url: &str) -> Result<bool, StorageError> {
        Job::exists_by_source_url(&self.pool, source_url).await
    }

    async fn insert(&self, job: &CreateJob) -> Result<Job, StorageError> {
        Job::create(&self.pool, job).await
    }
}
