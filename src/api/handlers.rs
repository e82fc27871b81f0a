//! REST API endpoint handlers
//!
//! Slip and match CRUD answers wrapped in the [`ApiResponse`] envelope.
//! The job endpoints return flat DTOs so polling clients can read
//! `status`, `progress` and friends at the top level.

use axum::{
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::api::types::{AddMatchRequest, ApiResponse, CancelJobRequest, CreateSlipRequest, Empty};
use crate::db::models::NewMatchRecord;
use crate::error::Result;
use crate::services::{
    BetslipService, GenerationService, JobStatusService, MatchService, TriggerRequest,
};
use crate::state::AppState;

// ============================================================================
// Health
// ============================================================================

pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Empty>::success_with_message(
        "Slipforge API is running",
    ))
}

// ============================================================================
// Master Slips
// ============================================================================

pub async fn create_slip(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(payload): Json<CreateSlipRequest>,
) -> Result<impl IntoResponse> {
    let slip = BetslipService::create_slip(&state, payload.stake, payload.currency.as_deref())?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_data(slip)),
    ))
}

pub async fn get_slip(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(slip_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let detail = BetslipService::get_slip_detail(&state, slip_id)?;
    Ok(Json(ApiResponse::success_with_data(detail.as_ref().clone())))
}

pub async fn add_match_to_slip(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(slip_id): Path<i64>,
    Json(payload): Json<AddMatchRequest>,
) -> Result<impl IntoResponse> {
    let added = BetslipService::add_match(
        &state,
        slip_id,
        payload.match_id,
        &payload.market,
        &payload.selection,
        payload.odds,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_data(added)),
    ))
}

pub async fn remove_match_from_slip(
    AxumState(state): AxumState<Arc<AppState>>,
    Path((slip_id, match_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let removed = BetslipService::remove_match(&state, slip_id, match_id)?;
    Ok(Json(ApiResponse::success_with_data(removed)))
}

pub async fn list_generated_slips(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(slip_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let slips = BetslipService::generated_slips(&state, slip_id)?;
    Ok(Json(ApiResponse::success_with_data(slips)))
}

// ============================================================================
// Slip Generation Jobs
// ============================================================================

/// Queue generation for a slip. Responds 202 with the job handle; progress
/// is read from the status endpoint.
pub async fn trigger_analysis(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(slip_id): Path<i64>,
    payload: Option<Json<TriggerRequest>>,
) -> Result<impl IntoResponse> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    info!(slip_id, strategy = ?request.strategy, "Analysis requested");
    let triggered = GenerationService::trigger(&state, slip_id, &request)?;
    Ok((StatusCode::ACCEPTED, Json(triggered)))
}

pub async fn job_status(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse> {
    let status = JobStatusService::get_status(&state, &job_id)?;
    Ok(Json(status))
}

/// Generated slips for a completed job; 404 until the job completes.
pub async fn job_results(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse> {
    let results = JobStatusService::get_results(&state, &job_id)?;
    Ok(Json(results))
}

pub async fn cancel_job(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(job_id): Path<String>,
    payload: Option<Json<CancelJobRequest>>,
) -> Result<impl IntoResponse> {
    let cancelled_by = payload
        .and_then(|Json(r)| r.cancelled_by)
        .unwrap_or_else(|| "user".to_string());
    info!(%job_id, %cancelled_by, "Cancel requested");
    let status = JobStatusService::cancel(&state, &job_id, &cancelled_by)?;
    Ok(Json(status))
}

// ============================================================================
// Matches
// ============================================================================

pub async fn create_match(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(payload): Json<NewMatchRecord>,
) -> Result<impl IntoResponse> {
    let record = MatchService::create(&state, payload)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_data(record)),
    ))
}

pub async fn get_match(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(match_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let record = MatchService::get(&state, match_id)?;
    Ok(Json(ApiResponse::success_with_data(record)))
}

pub async fn list_matches(
    AxumState(state): AxumState<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let records = MatchService::list(&state)?;
    Ok(Json(ApiResponse::success_with_data(records)))
}
