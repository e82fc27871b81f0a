//! Application state management

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::SqliteDb;
use crate::engine::PredictionEngine;
use crate::queue::JobQueue;
use crate::services::betslip_service::SlipDetail;

/// Application state shared across handlers and workers
pub struct AppState {
    /// Runtime configuration
    pub config: AppConfig,

    /// SQLite database connection
    pub db: Arc<SqliteDb>,

    /// Prediction engine client
    pub engine: Arc<dyn PredictionEngine>,

    /// In-process job queues
    pub queue: Arc<JobQueue>,

    /// Read-through cache of slip details, invalidated on every mutation
    slip_cache: DashMap<i64, Arc<SlipDetail>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Arc<SqliteDb>,
        engine: Arc<dyn PredictionEngine>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            config,
            db,
            engine,
            queue,
            slip_cache: DashMap::new(),
        }
    }

    /// Cached detail for a slip, if present
    pub fn cached_slip(&self, slip_id: i64) -> Option<Arc<SlipDetail>> {
        self.slip_cache.get(&slip_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Cache a freshly loaded slip detail
    pub fn cache_slip(&self, detail: SlipDetail) -> Arc<SlipDetail> {
        let detail = Arc::new(detail);
        self.slip_cache.insert(detail.slip.id, Arc::clone(&detail));
        detail
    }

    /// Drop a slip from the cache; the next read reloads it
    pub fn invalidate_slip(&self, slip_id: i64) {
        self.slip_cache.remove(&slip_id);
    }
}
