//! HTTP server lifecycle
//!
//! Runs the axum app on a background task and shuts it down gracefully
//! through a oneshot channel.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/api/v1/health", get(handlers::health_check))
        // Master slips
        .route("/api/v1/slips", post(handlers::create_slip))
        .route("/api/v1/slips/:id", get(handlers::get_slip))
        .route("/api/v1/slips/:id/matches", post(handlers::add_match_to_slip))
        .route(
            "/api/v1/slips/:id/matches/:match_id",
            delete(handlers::remove_match_from_slip),
        )
        .route("/api/v1/slips/:id/analyze", post(handlers::trigger_analysis))
        .route("/api/v1/slips/:id/generated", get(handlers::list_generated_slips))
        // Generation jobs
        .route("/api/v1/jobs/:job_id/status", get(handlers::job_status))
        .route("/api/v1/jobs/:job_id/results", get(handlers::job_results))
        .route("/api/v1/jobs/:job_id/cancel", post(handlers::cancel_job))
        // Matches
        .route("/api/v1/matches", post(handlers::create_match))
        .route("/api/v1/matches", get(handlers::list_matches))
        .route("/api/v1/matches/:id", get(handlers::get_match))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// REST API server handle
pub struct ApiServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    pub fn new() -> Self {
        Self { shutdown_tx: None }
    }

    /// Bind and serve on a background task
    pub async fn start(&mut self, state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
        if self.shutdown_tx.is_some() {
            return Err(AppError::Config("API server already running".to_string()));
        }

        let app = router(state);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    info!("API server shutting down");
                })
                .await;
            if let Err(e) = served {
                error!("API server error: {}", e);
            }
        });

        info!("API server listening on {}", local_addr);
        Ok(())
    }

    /// Signal the serve task to drain and exit
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Default for ApiServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
