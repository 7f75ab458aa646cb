pub mod scraper;

use axum::Router;
use axum::extract::OriginalUri;
use axum::routing::{get, post};

use crate::collectors::runner::ScrapeRunner;
use crate::error::AppError;

pub fn router(runner: ScrapeRunner) -> Router {
    let api = Router::new()
        .route("/jobs/scrape", post(scraper::trigger))
        .route("/scraper/status", get(scraper::status))
        .with_state(runner);

    Router::new().nest("/api/v1", api).fallback(not_found)
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
