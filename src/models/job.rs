use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StorageError;

pub const DEFAULT_JOB_TYPE: &str = "full-time";

/// A stored job posting. `id` and `created_at` are assigned by the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote_type: Option<String>,
    pub description: String,
    pub raw_description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<String>,
    pub source_url: Option<String>,
    pub validated_source_url: Option<String>,
    pub source_site: Option<String>,
    pub is_active: bool,
    pub posted_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Canonical record produced by every collector, before it has an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote_type: Option<String>,
    pub description: String,
    pub raw_description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: String,
    pub source_url: Option<String>,
    pub validated_source_url: Option<String>,
    pub source_site: String,
    pub is_active: bool,
    pub posted_date: DateTime<Utc>,
}

impl CreateJob {
    /// Title and company must both survive trimming.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.company.trim().is_empty()
    }

    /// The deduplication key, if the source provided one.
    pub fn dedup_key(&self) -> Option<&str> {
        self.source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn validated_url(&self) -> Option<&str> {
        self.validated_source_url
            .as_deref()
            .or_else(|| self.dedup_key())
    }
}

impl Job {
    pub async fn exists_by_source_url(pool: &PgPool, source_url: &str) -> Result<bool, StorageError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM jobs WHERE source_url = $1)")
            .bind(source_url)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Insert unless another row already owns the same source url.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, StorageError> {
        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (title, company, location, remote_type, description, raw_description, salary_min, salary_max, job_type, source_url, validated_source_url, source_site, is_active, posted_date) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) ON CONFLICT (source_url) WHERE source_url IS NOT NULL DO NOTHING RETURNING *",
        )
        .bind(input.title.trim())
        .bind(input.company.trim())
        .bind(&input.location)
        .bind(&input.remote_type)
        .bind(&input.description)
        .bind(&input.raw_description)
        .bind(input.salary_min)
        .bind(input.salary_max)
        .bind(&input.job_type)
        .bind(input.dedup_key())
        .bind(input.validated_url())
        .bind(&input.source_site)
        .bind(input.is_active)
        .bind(input.posted_date)
        .fetch_optional(pool)
        .await?;

        job.ok_or_else(|| StorageError::Conflict(input.dedup_key().unwrap_or_default().to_string()))
    }
}
