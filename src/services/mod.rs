//! Services Layer
//!
//! Business logic called by the HTTP handlers and the queue workers.
//! Services hold no state of their own; they take `&AppState` and compose
//! the database layer, the stats engines and the prediction engine into
//! the operations the API exposes.
//!
//! # Services
//!
//! - `BetslipService` - Create slips, add/remove selections, slip reads
//! - `MatchService` - Match record ingest and reads
//! - `SnapshotService` - Statistical snapshots for engine requests
//! - `GenerationService` - Trigger and execute slip generation jobs
//! - `JobStatusService` - Job status, results, cancellation

pub mod betslip_service;
pub mod generation_service;
pub mod match_service;
pub mod snapshot_service;
pub mod status_service;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types and services
pub use betslip_service::{
    AddMatchResult, AddOutcome, BetslipAggregator, BetslipService, RemoveMatchResult, SlipDetail,
    SlipSummary, MAX_SLIP_MATCHES, MIN_SLIP_MATCHES,
};
pub use generation_service::{GenerationService, TriggerRequest, TriggerResult};
pub use match_service::MatchService;
pub use snapshot_service::SnapshotService;
pub use status_service::{JobStatusResponse, JobStatusService};
