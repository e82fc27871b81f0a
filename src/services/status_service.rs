//! Job Status Service
//!
//! Answers polling clients: job status with slip-level analysis fields,
//! gated results access and cancellation. Stale running jobs are detected
//! lazily on read rather than by a background sweeper.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::STALE_JOB_MINUTES;
use crate::db::models::{
    AnalysisQuality, EngineStatus, GeneratedSlip, GeneratorJob, JobStatus,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Error recorded on jobs that sat in `running` past the stale bound
pub const STALE_JOB_MESSAGE: &str = "Job processing timeout (30+ minutes)";

/// Flat status answer for polling clients
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub master_slip_id: i64,
    pub status: JobStatus,
    pub progress: i64,
    pub engine_status: EngineStatus,
    pub analysis_quality: AnalysisQuality,
    pub alternative_slips_count: i64,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Job status service for business logic
pub struct JobStatusService;

impl JobStatusService {
    /// Current status of a job, merged with the slip's engine-level fields
    pub fn get_status(state: &AppState, job_id: &str) -> Result<JobStatusResponse> {
        let mut job = state.db.get_job(job_id)?;

        if job.status == JobStatus::Running && is_stale(&job) {
            warn!(%job_id, started_at = ?job.started_at, "Failing stale running job");
            Self::fail_stale(state, &job)?;
            job = state.db.get_job(job_id)?;
        }

        let slip = state.db.get_slip(job.master_slip_id)?;
        Ok(JobStatusResponse {
            job_id: job.job_id,
            master_slip_id: job.master_slip_id,
            status: job.status,
            progress: job.progress,
            engine_status: slip.engine_status,
            analysis_quality: slip.analysis_quality,
            alternative_slips_count: slip.alternative_slips_count,
            error_message: job.error_message,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }

    /// Generated slips for a completed job. Not-ready until then; polling
    /// clients treat that as "keep waiting".
    pub fn get_results(state: &AppState, job_id: &str) -> Result<Vec<GeneratedSlip>> {
        let job = state.db.get_job(job_id)?;
        if job.status != JobStatus::Completed {
            return Err(AppError::NotReady(format!(
                "Job {} is {}; results are available once completed",
                job_id,
                job.status.as_str()
            )));
        }
        state.db.get_generated_for_job(job_id)
    }

    /// Cancel a pending or running job. Terminal jobs answer Conflict.
    pub fn cancel(state: &AppState, job_id: &str, cancelled_by: &str) -> Result<JobStatusResponse> {
        info!(%job_id, cancelled_by, "JobStatusService::cancel");

        state.db.get_job(job_id)?;
        let now = Utc::now().to_rfc3339();
        if !state.db.try_cancel_job(job_id, cancelled_by, &now)? {
            let current = state.db.get_job(job_id)?;
            return Err(AppError::Conflict(format!(
                "Job {} is already {} and cannot be cancelled",
                job_id,
                current.status.as_str()
            )));
        }

        Self::get_status(state, job_id)
    }

    /// Fail a job that outlived the stale bound, and its slip with it, so
    /// polling clients see a consistent terminal state.
    fn fail_stale(state: &AppState, job: &GeneratorJob) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        if state.db.try_fail_job(&job.job_id, STALE_JOB_MESSAGE, &now)? {
            let slip = state.db.get_slip(job.master_slip_id)?;
            state
                .db
                .mark_slip_failed(slip.id, slip.lock_version, STALE_JOB_MESSAGE, &now)?;
            state.invalidate_slip(slip.id);
        }
        Ok(())
    }
}

fn is_stale(job: &GeneratorJob) -> bool {
    let Some(started_at) = job.started_at.as_deref() else {
        return false;
    };
    match DateTime::parse_from_rfc3339(started_at) {
        Ok(started) => {
            Utc::now().signed_duration_since(started) > chrono::Duration::minutes(STALE_JOB_MINUTES)
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SlipStatus;
    use crate::services::generation_service::{GenerationService, TriggerRequest};
    use crate::services::test_support::{ready_slip, test_state};

    #[test]
    fn status_merges_job_and_slip_fields() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);
        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");

        let status = JobStatusService::get_status(&state, &triggered.job_id).expect("status");
        assert_eq!(status.status, JobStatus::Pending);
        assert_eq!(status.progress, 0);
        assert_eq!(status.engine_status, EngineStatus::Queued);
        assert_eq!(status.analysis_quality, AnalysisQuality::Pending);
        assert_eq!(status.alternative_slips_count, 0);

        let missing = JobStatusService::get_status(&state, "job_missing").unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[test]
    fn results_are_gated_until_completion() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);
        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");

        let early = JobStatusService::get_results(&state, &triggered.job_id).unwrap_err();
        assert!(matches!(early, AppError::NotReady(_)));
    }

    #[test]
    fn stale_running_job_is_failed_on_read() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);
        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");

        // Job started 40 minutes ago and never finished
        let long_ago = (Utc::now() - chrono::Duration::minutes(40)).to_rfc3339();
        assert!(state.db.try_mark_running(&triggered.job_id, &long_ago).expect("running"));
        let slip = state.db.get_slip(slip_id).expect("slip");
        state
            .db
            .mark_slip_processing(slip.id, slip.lock_version, &long_ago)
            .expect("processing");

        let status = JobStatusService::get_status(&state, &triggered.job_id).expect("status");
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error_message.as_deref(), Some(STALE_JOB_MESSAGE));
        assert_eq!(status.engine_status, EngineStatus::Failed);

        let slip = state.db.get_slip(slip_id).expect("slip");
        assert_eq!(slip.status, SlipStatus::Failed);
    }

    #[test]
    fn fresh_running_job_is_left_alone() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);
        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");

        let just_now = Utc::now().to_rfc3339();
        assert!(state.db.try_mark_running(&triggered.job_id, &just_now).expect("running"));

        let status = JobStatusService::get_status(&state, &triggered.job_id).expect("status");
        assert_eq!(status.status, JobStatus::Running);
        assert_eq!(status.progress, 10);
    }

    #[test]
    fn cancel_is_terminal_once() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);
        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");

        let cancelled = JobStatusService::cancel(&state, &triggered.job_id, "user").expect("cancel");
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(cancelled.error_message.as_deref(), Some("Cancelled by user"));

        let again = JobStatusService::cancel(&state, &triggered.job_id, "user").unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
    }
}
