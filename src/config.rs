//! Service configuration
//!
//! All settings come from environment variables with working defaults, so a
//! bare `slipforge` starts a local instance with an on-disk database and the
//! engine expected on localhost.

use std::net::{IpAddr, SocketAddr};

use url::Url;

use crate::error::{AppError, Result};

/// Default client-level timeout for prediction engine calls (seconds)
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 90;

/// Default delay before an enqueued analysis payload becomes visible (seconds)
pub const DEFAULT_DISPATCH_DELAY_SECS: u64 = 1;

/// Running jobs older than this are lazily failed on status reads (minutes)
pub const STALE_JOB_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the HTTP API
    pub bind: SocketAddr,
    /// Path to the SQLite database file
    pub db_path: String,
    /// Base URL of the external prediction engine
    pub engine_url: Url,
    /// Client-level timeout for engine calls, in seconds
    pub engine_timeout_secs: u64,
    /// Number of queue workers to spawn
    pub worker_count: usize,
    /// Delay applied when enqueueing analysis jobs, in seconds
    pub dispatch_delay_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host: IpAddr = env_or("SLIPFORGE_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_HOST: {}", e)))?;
        let port: u16 = env_or("SLIPFORGE_PORT", "8721")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_PORT: {}", e)))?;

        let engine_url = Url::parse(&env_or(
            "SLIPFORGE_ENGINE_URL",
            "http://127.0.0.1:5001/api/generate-slips",
        ))
        .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_ENGINE_URL: {}", e)))?;

        let engine_timeout_secs: u64 = env_or(
            "SLIPFORGE_ENGINE_TIMEOUT_SECS",
            &DEFAULT_ENGINE_TIMEOUT_SECS.to_string(),
        )
        .parse()
        .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_ENGINE_TIMEOUT_SECS: {}", e)))?;

        let worker_count: usize = env_or("SLIPFORGE_WORKERS", "2")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_WORKERS: {}", e)))?;
        if worker_count == 0 {
            return Err(AppError::Config("SLIPFORGE_WORKERS must be >= 1".to_string()));
        }

        let dispatch_delay_secs: u64 = env_or(
            "SLIPFORGE_DISPATCH_DELAY_SECS",
            &DEFAULT_DISPATCH_DELAY_SECS.to_string(),
        )
        .parse()
        .map_err(|e| AppError::Config(format!("invalid SLIPFORGE_DISPATCH_DELAY_SECS: {}", e)))?;

        Ok(AppConfig {
            bind: SocketAddr::new(host, port),
            db_path: env_or("SLIPFORGE_DB", "slipforge.db"),
            engine_url,
            engine_timeout_secs,
            worker_count,
            dispatch_delay_secs,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        // Only exercises the default strings, not the process environment
        let cfg = AppConfig {
            bind: "127.0.0.1:8721".parse().expect("bind"),
            db_path: "slipforge.db".to_string(),
            engine_url: Url::parse("http://127.0.0.1:5001/api/generate-slips").expect("url"),
            engine_timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
            worker_count: 2,
            dispatch_delay_secs: DEFAULT_DISPATCH_DELAY_SECS,
        };
        assert_eq!(cfg.bind.port(), 8721);
        assert_eq!(cfg.engine_url.path(), "/api/generate-slips");
        assert_eq!(cfg.engine_timeout_secs, 90);
    }
}
