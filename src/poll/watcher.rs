//! Bounded job polling
//!
//! Watches one generation job through the status service until it reaches
//! a terminal state, the local poll budget runs out, or the watch is
//! cancelled. Whichever happens first fires the callback exactly once and
//! ends the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::models::JobStatus;
use crate::services::{JobStatusResponse, JobStatusService};
use crate::state::AppState;

/// Seconds between status polls
pub const POLL_INTERVAL_SECS: u64 = 2;
/// Local budget; after this the watcher gives up regardless of backend state
pub const POLL_DEADLINE_SECS: u64 = 90;

/// Why the watch ended
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// The backend reported a terminal status (completed, failed or cancelled)
    Finished(JobStatusResponse),
    /// The poll budget elapsed before the job finished
    TimedOut,
    /// The watch was cancelled from this side
    Cancelled,
}

/// Handle to a background polling task
pub struct JobWatcher {
    cancel_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl JobWatcher {
    /// Watch with the standard 2s interval and 90s budget
    pub fn spawn<F>(state: Arc<AppState>, job_id: String, on_terminal: F) -> Self
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        Self::spawn_with(
            state,
            job_id,
            Duration::from_secs(POLL_INTERVAL_SECS),
            Duration::from_secs(POLL_DEADLINE_SECS),
            on_terminal,
        )
    }

    pub fn spawn_with<F>(
        state: Arc<AppState>,
        job_id: String,
        interval: Duration,
        deadline: Duration,
        on_terminal: F,
    ) -> Self
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let deadline_at = tokio::time::Instant::now() + deadline;
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    biased;

                    _ = &mut cancel_rx => {
                        info!(%job_id, "Job watch cancelled");
                        on_terminal(WatchOutcome::Cancelled);
                        return;
                    }
                    _ = tokio::time::sleep_until(deadline_at) => {
                        warn!(%job_id, "Job watch exceeded its poll budget");
                        on_terminal(WatchOutcome::TimedOut);
                        return;
                    }
                    _ = ticker.tick() => {
                        match JobStatusService::get_status(&state, &job_id) {
                            Ok(status) if is_terminal(status.status) => {
                                info!(%job_id, status = status.status.as_str(), "Job watch finished");
                                on_terminal(WatchOutcome::Finished(status));
                                return;
                            }
                            Ok(status) => {
                                debug!(%job_id, progress = status.progress, "Job still in flight");
                            }
                            // Transient read failures burn budget, not the watch
                            Err(e) => {
                                warn!(%job_id, "Status poll failed: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Self {
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Stop polling; the cancellation callback fires from the task
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Wait for the polling task to wind down
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for JobWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn is_terminal(status: JobStatus) -> bool {
    matches!(
        status,
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
    )
}
