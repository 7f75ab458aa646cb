mod collectors;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::collectors::runner::{ScrapeRunner, run_scheduler};
use crate::config::{Command, Config};
use crate::store::PgJobStore;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: PgPool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("job_ingest=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let collectors = collectors::default_collectors(&config)?;
    let runner = ScrapeRunner::new(
        collectors,
        Arc::new(PgJobStore::new(pool.clone())),
        config.queue_capacity as usize,
    );

    match config.resolved_command() {
        Command::RunOnce => {
            let stats = runner
                .run()
                .await
                .ok_or_else(|| anyhow::anyhow!("A run is already in progress"))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Serve {
            listen_addr,
            scrape_interval_secs,
            skip_initial_run,
        } => {
            let scheduler = tokio::spawn(run_scheduler(
                runner.clone(),
                Duration::from_secs(scrape_interval_secs),
                !skip_initial_run,
            ));

            let readyz_pool = pool.clone();
            let app = Router::new()
                .route("/healthz", get(healthz))
                .route("/readyz", get(move || readyz(readyz_pool.clone())))
                .merge(routes::api::router(runner))
                .layer(TraceLayer::new_for_http());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            if let Err(e) = scheduler.await {
                tracing::warn!("Scheduler task ended abnormally: {e}");
            }
        }
    }

    Ok(())
}
