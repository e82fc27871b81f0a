//! Worker pool draining the job queues

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{JobPayload, JobQueue, QueueName};
use crate::services::GenerationService;
use crate::state::AppState;

/// Background workers that pull payloads off the queues and run them
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers against the shared queue
    pub fn spawn(count: usize, queue: Arc<JobQueue>, state: Arc<AppState>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = (0..count)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let state = Arc::clone(&state);
                let mut shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    tracing::info!(worker_id, "Queue worker started");
                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            (queue_name, payload) = queue.pop() => {
                                dispatch(&state, worker_id, queue_name, payload).await;
                            }
                        }
                    }
                    tracing::info!(worker_id, "Queue worker stopped");
                })
            })
            .collect();

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal all workers to stop after their current payload
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the workers and wait for them to wind down
    pub async fn join(self) {
        self.shutdown();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn dispatch(state: &Arc<AppState>, worker_id: usize, queue: QueueName, payload: JobPayload) {
    tracing::debug!(
        worker_id,
        queue = queue.as_str(),
        job_id = payload.job_id(),
        "Picked up job"
    );
    match payload {
        JobPayload::GenerateSlips { job_id, .. } => {
            if let Err(e) = GenerationService::run_job(state, &job_id).await {
                tracing::error!(worker_id, %job_id, error = %e, "Generation job errored");
            }
        }
    }
}
