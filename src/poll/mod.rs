//! Client-side polling for generation jobs

pub mod watcher;

pub use watcher::{JobWatcher, WatchOutcome, POLL_DEADLINE_SECS, POLL_INTERVAL_SECS};
