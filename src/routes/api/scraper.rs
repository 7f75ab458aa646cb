use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::collectors::runner::ScrapeRunner;
use crate::models::run_stats::ScraperStatus;

/// POST /api/v1/jobs/scrape
///
/// Starts a run in the background and returns immediately. A trigger that
/// arrives while a run is active is accepted but has no effect.
pub async fn trigger(State(runner): State<ScrapeRunner>) -> (StatusCode, Json<Value>) {
    let started = runner.start_run();
    let message = if started {
        "Scraping started in background"
    } else {
        "Scraping already in progress"
    };

    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": message, "started": started })),
    )
}

/// GET /api/v1/scraper/status
pub async fn status(State(runner): State<ScrapeRunner>) -> Json<ScraperStatus> {
    Json(runner.status())
}
