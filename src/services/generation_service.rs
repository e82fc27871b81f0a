//! Generation Service
//!
//! Owns the slip-generation job from trigger to terminal state: validates
//! preconditions, enqueues the payload, and on the worker side snapshots the
//! slip, calls the prediction engine and reconciles the results back onto
//! the master slip.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::db;
use crate::db::models::{
    AnalysisQuality, GeneratedSlip, GeneratorJob, JobStatus, NewGeneratedSlip, NewGeneratedSlipLeg,
    RiskLevel, SlipSelection,
};
use crate::engine::{EngineRequest, SlipCandidate};
use crate::error::{AppError, Result};
use crate::queue::{JobPayload, QueueName};
use crate::services::betslip_service::{BetslipAggregator, MAX_SLIP_MATCHES, MIN_SLIP_MATCHES};
use crate::services::snapshot_service::SnapshotService;
use crate::state::AppState;

/// Strategies the engine understands
pub const STRATEGIES: [&str; 6] = [
    "monte_carlo",
    "coverage",
    "ml_prediction",
    "mixed",
    "value_betting",
    "arbitrage",
];
pub const DEFAULT_STRATEGY: &str = "monte_carlo";

/// Progress checkpoints reported while a job runs. Dequeue sets 10.
const PROGRESS_SNAPSHOTTED: i64 = 30;
const PROGRESS_ENGINE_DONE: i64 = 70;

/// Mean selected odds above these bounds bump the derived risk profile
const HIGH_RISK_ODDS: f64 = 3.0;
const MEDIUM_RISK_ODDS: f64 = 2.0;

/// Mean confidence thresholds for the slip's analysis quality
const PREMIUM_CONFIDENCE: f64 = 0.80;
const HIGH_CONFIDENCE: f64 = 0.65;
const MEDIUM_CONFIDENCE: f64 = 0.50;

/// Client request to trigger analysis on a slip
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub risk_profile: Option<String>,
}

/// Answer to a trigger: the job handle the client polls
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResult {
    pub job_id: String,
    pub master_slip_id: i64,
    pub status: JobStatus,
    pub strategy: String,
    pub risk_profile: RiskLevel,
}

/// Generation service for business logic
pub struct GenerationService;

impl GenerationService {
    /// Validate preconditions, create the pending job and enqueue it.
    ///
    /// Fails with Conflict when another job is already active for the slip,
    /// and with Validation when the slip is outside the 5-10 window or the
    /// strategy/risk input is unknown.
    pub fn trigger(state: &AppState, slip_id: i64, request: &TriggerRequest) -> Result<TriggerResult> {
        info!(slip_id, "GenerationService::trigger");

        let slip = state.db.get_slip(slip_id)?;
        let selections = state.db.get_selections(slip_id)?;

        let aggregator =
            BetslipAggregator::from_match_ids(selections.iter().map(|s| s.match_id));
        if !aggregator.is_ready() {
            return Err(AppError::Validation(format!(
                "Slip needs between {} and {} selections to analyze, has {}",
                MIN_SLIP_MATCHES,
                MAX_SLIP_MATCHES,
                selections.len()
            )));
        }

        if let Some(active) = state.db.get_active_job_for_slip(slip_id)? {
            return Err(AppError::Conflict(format!(
                "Analysis already in progress for slip {} (job {})",
                slip_id, active.job_id
            )));
        }

        let strategy = validate_strategy(request.strategy.as_deref())?;
        let risk_profile = match request.risk_profile.as_deref() {
            Some(raw) => RiskLevel::parse(raw).ok_or_else(|| {
                AppError::Validation(format!("Unknown risk profile: {}", raw))
            })?,
            None => derive_risk_profile(&selections),
        };

        let job_id = db::generate_job_id();
        let job = state.db.create_job_and_queue_slip(
            &job_id,
            slip_id,
            strategy,
            risk_profile,
            slip.lock_version,
        )?;
        state.invalidate_slip(slip_id);

        state.queue.enqueue(
            QueueName::SlipGeneration,
            JobPayload::GenerateSlips {
                job_id: job_id.clone(),
                master_slip_id: slip_id,
            },
            Duration::from_secs(state.config.dispatch_delay_secs),
        );

        info!(
            %job_id,
            slip_id,
            strategy,
            risk_profile = risk_profile.as_str(),
            "Generation job queued"
        );

        Ok(TriggerResult {
            job_id,
            master_slip_id: slip_id,
            status: job.status,
            strategy: job.strategy,
            risk_profile: job.risk_profile,
        })
    }

    /// Execute a dequeued payload end to end. Any error is recorded on the
    /// job and the slip before it propagates to the worker's log.
    pub async fn run_job(state: &AppState, job_id: &str) -> Result<()> {
        let started_at = Utc::now().to_rfc3339();
        if !state.db.try_mark_running(job_id, &started_at)? {
            info!(%job_id, "Dropping payload; job is no longer pending");
            return Ok(());
        }

        let job = state.db.get_job(job_id)?;
        info!(
            %job_id,
            master_slip_id = job.master_slip_id,
            strategy = %job.strategy,
            "Generation job running"
        );

        if let Err(e) = Self::execute(state, &job).await {
            warn!(%job_id, error = %e, "Generation job failed");
            Self::record_failure(state, &job, &e);
            return Err(e);
        }
        Ok(())
    }

    async fn execute(state: &AppState, job: &GeneratorJob) -> Result<()> {
        let slip = state.db.get_slip(job.master_slip_id)?;
        let now = Utc::now().to_rfc3339();
        state.db.mark_slip_processing(slip.id, slip.lock_version, &now)?;
        state.invalidate_slip(slip.id);

        let selections = state.db.get_selections(slip.id)?;
        if selections.is_empty() {
            return Err(AppError::Validation(format!(
                "Slip {} has no selections to analyze",
                slip.id
            )));
        }

        let snapshots = SnapshotService::build_snapshots(&state.db, &selections)?;
        state.db.set_progress(&job.job_id, PROGRESS_SNAPSHOTTED)?;

        let request = EngineRequest {
            job_id: job.job_id.clone(),
            master_slip_id: slip.id,
            stake: slip.stake,
            currency: slip.currency.clone(),
            strategy: job.strategy.clone(),
            risk_profile: job.risk_profile,
            total_matches: snapshots.len(),
            match_snapshots: snapshots,
            created_at: Utc::now().to_rfc3339(),
        };

        let response = state.engine.generate_slips(&request).await?;
        state.db.set_progress(&job.job_id, PROGRESS_ENGINE_DONE)?;

        if response.alternative_slips.is_empty() {
            return Err(AppError::Engine(
                "Engine returned no alternative slips".to_string(),
            ));
        }

        let candidates: Vec<NewGeneratedSlip> = response
            .alternative_slips
            .iter()
            .map(|c| candidate_to_row(slip.stake, c))
            .collect();

        let completed_at = Utc::now().to_rfc3339();
        let Some(stored) =
            state
                .db
                .persist_job_results(&job.job_id, slip.id, &candidates, &completed_at)?
        else {
            warn!(job_id = %job.job_id, "Job left the running state; engine results dropped");
            return Ok(());
        };

        let best_id = best_candidate(&stored);
        let quality = quality_from_confidence(&stored);
        let fresh = state.db.get_slip(slip.id)?;
        state.db.mark_slip_completed(
            fresh.id,
            fresh.lock_version,
            stored.len() as i64,
            best_id,
            quality,
            &completed_at,
        )?;
        state.invalidate_slip(slip.id);

        info!(
            job_id = %job.job_id,
            slip_id = slip.id,
            count = stored.len(),
            quality = quality.as_str(),
            "Generation job completed"
        );
        Ok(())
    }

    /// Record a failure on the job and the slip. Terminal jobs are left
    /// alone so a late error cannot overwrite a cancellation.
    fn record_failure(state: &AppState, job: &GeneratorJob, err: &AppError) {
        let message = err.to_string();
        let now = Utc::now().to_rfc3339();

        match state.db.try_fail_job(&job.job_id, &message, &now) {
            Ok(true) => {
                if let Err(slip_err) =
                    Self::fail_slip(state, job.master_slip_id, &message, &now)
                {
                    error!(
                        job_id = %job.job_id,
                        error = %slip_err,
                        "Could not mark slip failed"
                    );
                }
            }
            Ok(false) => {
                warn!(job_id = %job.job_id, "Job already terminal; failure not recorded")
            }
            Err(db_err) => {
                error!(job_id = %job.job_id, error = %db_err, "Could not record job failure")
            }
        }
    }

    fn fail_slip(state: &AppState, slip_id: i64, message: &str, now: &str) -> Result<()> {
        let slip = state.db.get_slip(slip_id)?;
        state
            .db
            .mark_slip_failed(slip.id, slip.lock_version, message, now)?;
        state.invalidate_slip(slip_id);
        Ok(())
    }
}

fn validate_strategy(requested: Option<&str>) -> Result<&str> {
    match requested {
        None => Ok(DEFAULT_STRATEGY),
        Some(raw) => STRATEGIES
            .iter()
            .find(|s| **s == raw)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("Unknown strategy: {}", raw))),
    }
}

/// Risk profile from the mean selected odds when the client does not pick one
fn derive_risk_profile(selections: &[SlipSelection]) -> RiskLevel {
    if selections.is_empty() {
        return RiskLevel::Low;
    }
    let mean = selections.iter().map(|s| s.odds).sum::<f64>() / selections.len() as f64;
    if mean > HIGH_RISK_ODDS {
        RiskLevel::High
    } else if mean > MEDIUM_RISK_ODDS {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn candidate_to_row(master_stake: f64, candidate: &SlipCandidate) -> NewGeneratedSlip {
    NewGeneratedSlip {
        stake: candidate.stake.unwrap_or(master_stake),
        total_odds: candidate.total_odds,
        possible_return: candidate.potential_return,
        risk_level: candidate.risk_level,
        confidence_score: candidate.confidence_score,
        legs: candidate
            .selections
            .iter()
            .map(|leg| NewGeneratedSlipLeg {
                match_id: leg.match_id,
                market: leg.market.clone(),
                selection: leg.selection.clone(),
                odds: leg.odds,
            })
            .collect(),
    }
}

fn best_candidate(stored: &[GeneratedSlip]) -> Option<i64> {
    stored
        .iter()
        .max_by(|a, b| {
            a.confidence_score
                .partial_cmp(&b.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|s| s.id)
}

fn quality_from_confidence(stored: &[GeneratedSlip]) -> AnalysisQuality {
    if stored.is_empty() {
        return AnalysisQuality::Low;
    }
    let mean =
        stored.iter().map(|s| s.confidence_score).sum::<f64>() / stored.len() as f64;
    if mean >= PREMIUM_CONFIDENCE {
        AnalysisQuality::Premium
    } else if mean >= HIGH_CONFIDENCE {
        AnalysisQuality::High
    } else if mean >= MEDIUM_CONFIDENCE {
        AnalysisQuality::Medium
    } else {
        AnalysisQuality::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{EngineStatus, SlipStatus};
    use crate::services::test_support::{
        candidate, ready_slip, test_state, test_state_with_db_engine, test_state_with_engine,
        CancellingEngine, ScriptedEngine, ScriptedReply,
    };
    use std::sync::Arc;

    #[test]
    fn derives_risk_from_mean_odds() {
        let selection = |odds: f64| SlipSelection {
            id: 0,
            slip_id: 1,
            match_id: 1,
            market: "match_result".to_string(),
            selection: "home".to_string(),
            odds,
            analysis: None,
            position: 0,
            created_at: String::new(),
        };

        assert_eq!(derive_risk_profile(&[selection(1.5), selection(1.9)]), RiskLevel::Low);
        assert_eq!(derive_risk_profile(&[selection(2.5), selection(2.1)]), RiskLevel::Medium);
        assert_eq!(derive_risk_profile(&[selection(3.5), selection(4.0)]), RiskLevel::High);
        assert_eq!(derive_risk_profile(&[]), RiskLevel::Low);
    }

    #[test]
    fn quality_tracks_mean_confidence() {
        let slip = |confidence: f64| GeneratedSlip {
            id: 0,
            master_slip_id: 1,
            job_id: "job_x".to_string(),
            stake: 10.0,
            total_odds: 2.0,
            possible_return: 20.0,
            risk_level: RiskLevel::Medium,
            confidence_score: confidence,
            created_at: String::new(),
            legs: Vec::new(),
        };

        assert_eq!(quality_from_confidence(&[slip(0.85), slip(0.9)]), AnalysisQuality::Premium);
        assert_eq!(quality_from_confidence(&[slip(0.7)]), AnalysisQuality::High);
        assert_eq!(quality_from_confidence(&[slip(0.5), slip(0.55)]), AnalysisQuality::Medium);
        assert_eq!(quality_from_confidence(&[slip(0.2)]), AnalysisQuality::Low);
    }

    #[test]
    fn trigger_requires_a_ready_slip() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 4);

        let err = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn trigger_creates_pending_job_and_queues_payload() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);

        let result = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        assert_eq!(result.status, JobStatus::Pending);
        assert_eq!(result.strategy, "monte_carlo");
        assert!(result.job_id.starts_with("job_"));

        let slip = state.db.get_slip(slip_id).expect("slip");
        assert_eq!(slip.engine_status, EngineStatus::Queued);
        assert_eq!(state.queue.len(), 1);
    }

    #[test]
    fn second_trigger_while_active_conflicts() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);

        GenerationService::trigger(&state, slip_id, &TriggerRequest::default()).expect("first");
        let err = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(state.queue.len(), 1, "no second payload enqueued");
    }

    #[test]
    fn trigger_rejects_unknown_inputs() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);

        let bad_strategy = GenerationService::trigger(
            &state,
            slip_id,
            &TriggerRequest {
                strategy: Some("astrology".to_string()),
                risk_profile: None,
            },
        )
        .unwrap_err();
        assert!(matches!(bad_strategy, AppError::Validation(_)));

        let bad_risk = GenerationService::trigger(
            &state,
            slip_id,
            &TriggerRequest {
                strategy: None,
                risk_profile: Some("reckless".to_string()),
            },
        )
        .unwrap_err();
        assert!(matches!(bad_risk, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn lifecycle_completes_with_engine_candidates() {
        let engine = ScriptedEngine::with_candidates(vec![
            candidate(0.5, 3.0),
            candidate(0.9, 2.2),
            candidate(0.7, 4.1),
        ]);
        let (_dir, state) = test_state_with_engine(engine);
        let slip_id = ready_slip(&state, 5);

        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        GenerationService::run_job(&state, &triggered.job_id)
            .await
            .expect("run");

        let job = state.db.get_job(&triggered.job_id).expect("job");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.generated_slips, 3);

        let slip = state.db.get_slip(slip_id).expect("slip");
        assert_eq!(slip.status, SlipStatus::Completed);
        assert_eq!(slip.engine_status, EngineStatus::Completed);
        assert_eq!(slip.alternative_slips_count, 3);
        // Mean confidence 0.7 lands in the high band
        assert_eq!(slip.analysis_quality, AnalysisQuality::High);
        assert!(slip.processing_completed_at.is_some());

        let generated = state.db.get_generated_for_slip(slip_id).expect("generated");
        assert_eq!(generated.len(), 3);
        assert_eq!(slip.best_alternative_slip_id, Some(generated[0].id));
        assert_eq!(generated[0].confidence_score, 0.9);
    }

    #[tokio::test]
    async fn engine_error_fails_job_and_slip() {
        let engine = ScriptedEngine::new(vec![ScriptedReply::Error(AppError::Timeout(
            "Engine request timed out".to_string(),
        ))]);
        let (_dir, state) = test_state_with_engine(engine);
        let slip_id = ready_slip(&state, 5);

        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        let err = GenerationService::run_job(&state, &triggered.job_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));

        let job = state.db.get_job(&triggered.job_id).expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.as_deref().unwrap_or("").contains("timed out"));

        let slip = state.db.get_slip(slip_id).expect("slip");
        assert_eq!(slip.status, SlipStatus::Failed);
        assert_eq!(slip.engine_status, EngineStatus::Failed);
        // Selections survive a failed analysis
        assert_eq!(state.db.get_selections(slip_id).expect("selections").len(), 5);
    }

    #[tokio::test]
    async fn empty_engine_response_is_a_failure() {
        let engine = ScriptedEngine::with_candidates(Vec::new());
        let (_dir, state) = test_state_with_engine(engine);
        let slip_id = ready_slip(&state, 5);

        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        let err = GenerationService::run_job(&state, &triggered.job_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));

        let job = state.db.get_job(&triggered.job_id).expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .error_message
            .as_deref()
            .unwrap_or("")
            .contains("no alternative slips"));
    }

    #[tokio::test]
    async fn cancellation_mid_flight_drops_engine_results() {
        // The engine double cancels its own job before answering, standing
        // in for a user cancel racing the engine call.
        let (_dir, state) = test_state_with_db_engine(|db| {
            Arc::new(CancellingEngine {
                db,
                candidates: vec![candidate(0.8, 2.5)],
            })
        });
        let slip_id = ready_slip(&state, 5);

        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        GenerationService::run_job(&state, &triggered.job_id)
            .await
            .expect("run completes quietly");

        let job = state.db.get_job(&triggered.job_id).expect("job");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(state
            .db
            .get_generated_for_job(&triggered.job_id)
            .expect("generated")
            .is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_dequeue_is_dropped() {
        let (_dir, state) = test_state();
        let slip_id = ready_slip(&state, 5);

        let triggered = GenerationService::trigger(&state, slip_id, &TriggerRequest::default())
            .expect("trigger");
        assert!(state
            .db
            .try_cancel_job(&triggered.job_id, "user", &Utc::now().to_rfc3339())
            .expect("cancel"));

        GenerationService::run_job(&state, &triggered.job_id)
            .await
            .expect("payload dropped");
        let job = state.db.get_job(&triggered.job_id).expect("job");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.started_at.is_none());
    }
}
