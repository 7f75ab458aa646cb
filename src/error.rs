use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failure of a whole collector call. Record-level problems never become one
/// of these; the offending record is dropped instead.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{source_name} request failed: {error}")]
    Transport {
        source_name: &'static str,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name} returned status {status}")]
    Status {
        source_name: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Failed to parse {source_name} response: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },
}

impl ScrapeError {
    pub fn parse(source_name: &'static str, message: impl std::fmt::Display) -> Self {
        ScrapeError::Parse {
            source_name,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job with source url '{0}' already exists")]
    Conflict(String),
}
