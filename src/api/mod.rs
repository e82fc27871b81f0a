//! REST API: router, handlers and wire types

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{router, ApiServer};
pub use types::{AddMatchRequest, ApiResponse, CancelJobRequest, CreateSlipRequest};
