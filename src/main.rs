//! Slipforge server binary
//!
//! Wires config, database, engine client, queue workers and the REST API
//! together, then runs until interrupted.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anyhow::Context;

use slipforge::api::ApiServer;
use slipforge::config::AppConfig;
use slipforge::db::SqliteDb;
use slipforge::engine::http::HttpPredictionEngine;
use slipforge::queue::{JobQueue, WorkerPool};
use slipforge::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slipforge=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slipforge...");

    let config = AppConfig::from_env().context("loading configuration")?;
    let db = Arc::new(
        SqliteDb::new(Path::new(&config.db_path))
            .with_context(|| format!("opening database at {}", config.db_path))?,
    );
    let engine = Arc::new(HttpPredictionEngine::new(
        config.engine_url.clone(),
        config.engine_timeout_secs,
    )?);
    let queue = Arc::new(JobQueue::new());

    let bind = config.bind;
    let worker_count = config.worker_count;
    let state = Arc::new(AppState::new(config, db, engine, Arc::clone(&queue)));

    let pool = WorkerPool::spawn(worker_count, queue, Arc::clone(&state));

    let mut server = ApiServer::new();
    server.start(Arc::clone(&state), bind).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.stop();
    pool.join().await;

    tracing::info!("Slipforge stopped");
    Ok(())
}
