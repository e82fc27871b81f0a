//! In-process job queues
//!
//! Jobs land on named queues and are drained by a small worker pool in
//! strict priority order: `slip_generation` first, then `python_requests`,
//! `ml_processing` and finally `default`.

mod job_queue;
mod worker;

pub use job_queue::{JobPayload, JobQueue, QueueName};
pub use worker::WorkerPool;
