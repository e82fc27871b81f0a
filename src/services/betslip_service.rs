//! Betslip Service
//!
//! Accumulates match selections onto a master slip, keeps the derived
//! totals in sync and answers slip reads through the state cache.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::models::{GeneratedSlip, MasterSlip, SlipSelection};
use crate::error::{AppError, Result};
use crate::services::snapshot_service::SnapshotService;
use crate::state::AppState;
use crate::stats::round_to;

/// A slip must carry at least this many selections before analysis
pub const MIN_SLIP_MATCHES: usize = 5;
/// Hard cap on selections per slip
pub const MAX_SLIP_MATCHES: usize = 10;

/// Entered odds below this are rejected
const MIN_SELECTION_ODDS: f64 = 1.01;

/// Domain-level outcome of an add attempt. Duplicates and a full slip are
/// not errors here; the HTTP layer maps them to Conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    SlipFull,
}

/// Pure accumulation rules for the selections on one slip
#[derive(Debug, Clone, Default)]
pub struct BetslipAggregator {
    match_ids: Vec<i64>,
}

impl BetslipAggregator {
    pub fn from_match_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            match_ids: ids.into_iter().collect(),
        }
    }

    pub fn add_match(&mut self, match_id: i64) -> AddOutcome {
        if self.match_ids.contains(&match_id) {
            return AddOutcome::AlreadyPresent;
        }
        if self.match_ids.len() >= MAX_SLIP_MATCHES {
            return AddOutcome::SlipFull;
        }
        self.match_ids.push(match_id);
        AddOutcome::Added
    }

    /// Remove by identity; false when the match was not on the slip
    pub fn remove_match(&mut self, match_id: i64) -> bool {
        let before = self.match_ids.len();
        self.match_ids.retain(|id| *id != match_id);
        self.match_ids.len() < before
    }

    pub fn is_ready(&self) -> bool {
        (MIN_SLIP_MATCHES..=MAX_SLIP_MATCHES).contains(&self.match_ids.len())
    }

    pub fn can_add_more(&self) -> bool {
        self.match_ids.len() < MAX_SLIP_MATCHES
    }

    pub fn len(&self) -> usize {
        self.match_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.match_ids.is_empty()
    }

    pub fn match_ids(&self) -> &[i64] {
        &self.match_ids
    }

    pub fn summary(&self) -> SlipSummary {
        SlipSummary {
            selection_count: self.match_ids.len(),
            is_ready: self.is_ready(),
            can_add_more: self.can_add_more(),
            match_ids: self.match_ids.clone(),
        }
    }
}

/// Compact readiness view of a slip
#[derive(Debug, Clone, Serialize)]
pub struct SlipSummary {
    pub selection_count: usize,
    pub is_ready: bool,
    pub can_add_more: bool,
    pub match_ids: Vec<i64>,
}

/// A master slip with its selections, as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct SlipDetail {
    #[serde(flatten)]
    pub slip: MasterSlip,
    pub selections: Vec<SlipSelection>,
    pub selection_count: usize,
    pub is_ready: bool,
    pub can_add_more: bool,
}

impl SlipDetail {
    pub fn new(slip: MasterSlip, selections: Vec<SlipSelection>) -> Self {
        let aggregator =
            BetslipAggregator::from_match_ids(selections.iter().map(|s| s.match_id));
        Self {
            slip,
            selection_count: selections.len(),
            is_ready: aggregator.is_ready(),
            can_add_more: aggregator.can_add_more(),
            selections,
        }
    }
}

/// Result of adding a selection
#[derive(Debug, Clone, Serialize)]
pub struct AddMatchResult {
    pub selection: SlipSelection,
    pub summary: SlipSummary,
    /// False when the totals write failed; selections are still intact
    pub synced: bool,
}

/// Result of removing a selection
#[derive(Debug, Clone, Serialize)]
pub struct RemoveMatchResult {
    pub removed: bool,
    pub summary: SlipSummary,
    pub synced: bool,
}

/// Betslip service for business logic
pub struct BetslipService;

impl BetslipService {
    /// Create an empty master slip
    pub fn create_slip(
        state: &AppState,
        stake: Option<f64>,
        currency: Option<&str>,
    ) -> Result<MasterSlip> {
        let stake = stake.unwrap_or(10.0);
        if !stake.is_finite() || stake <= 0.0 {
            return Err(AppError::Validation("Stake must be positive".to_string()));
        }
        let currency = currency.unwrap_or("EUR");

        let slip = state.db.create_slip(stake, currency)?;
        info!(slip_id = slip.id, stake, currency, "Created master slip");
        Ok(slip)
    }

    /// Slip with selections and readiness, via the read-through cache
    pub fn get_slip_detail(state: &AppState, slip_id: i64) -> Result<Arc<SlipDetail>> {
        if let Some(hit) = state.cached_slip(slip_id) {
            return Ok(hit);
        }
        let slip = state.db.get_slip(slip_id)?;
        let selections = state.db.get_selections(slip_id)?;
        Ok(state.cache_slip(SlipDetail::new(slip, selections)))
    }

    /// Add a match selection to a slip
    pub fn add_match(
        state: &AppState,
        slip_id: i64,
        match_id: i64,
        market: &str,
        selection: &str,
        odds: f64,
    ) -> Result<AddMatchResult> {
        info!(slip_id, match_id, market, "BetslipService::add_match");

        if market.trim().is_empty() || selection.trim().is_empty() {
            return Err(AppError::Validation(
                "Market and selection must not be empty".to_string(),
            ));
        }
        if !odds.is_finite() || odds < MIN_SELECTION_ODDS {
            return Err(AppError::Validation(format!(
                "Odds must be at least {}",
                MIN_SELECTION_ODDS
            )));
        }

        state.db.get_slip(slip_id)?;
        let record = state.db.get_match(match_id)?;
        let existing = state.db.get_selections(slip_id)?;

        let mut aggregator =
            BetslipAggregator::from_match_ids(existing.iter().map(|s| s.match_id));
        match aggregator.add_match(match_id) {
            AddOutcome::Added => {}
            AddOutcome::AlreadyPresent => {
                return Err(AppError::Conflict(format!(
                    "Match {} is already on slip {}",
                    match_id, slip_id
                )));
            }
            AddOutcome::SlipFull => {
                return Err(AppError::Conflict(format!(
                    "Slip {} already has the maximum of {} selections",
                    slip_id, MAX_SLIP_MATCHES
                )));
            }
        }

        let analysis = SnapshotService::selection_analysis(&record, market, selection, odds);
        let position = existing.len() as i64;
        let stored = state.db.add_selection(
            slip_id,
            match_id,
            market,
            selection,
            odds,
            Some(&analysis),
            position,
        )?;
        state.invalidate_slip(slip_id);

        let synced = Self::sync_totals(state, slip_id);
        Ok(AddMatchResult {
            selection: stored,
            summary: aggregator.summary(),
            synced,
        })
    }

    /// Remove a match selection. Absent matches are a no-op, not an error.
    pub fn remove_match(state: &AppState, slip_id: i64, match_id: i64) -> Result<RemoveMatchResult> {
        info!(slip_id, match_id, "BetslipService::remove_match");

        state.db.get_slip(slip_id)?;
        let removed = state.db.remove_selection(slip_id, match_id)?;
        state.invalidate_slip(slip_id);

        let synced = if removed {
            Self::sync_totals(state, slip_id)
        } else {
            true
        };

        let remaining = state.db.get_selections(slip_id)?;
        let aggregator =
            BetslipAggregator::from_match_ids(remaining.iter().map(|s| s.match_id));
        Ok(RemoveMatchResult {
            removed,
            summary: aggregator.summary(),
            synced,
        })
    }

    /// Generated slips proposed for a master slip, best confidence first
    pub fn generated_slips(state: &AppState, slip_id: i64) -> Result<Vec<GeneratedSlip>> {
        state.db.get_slip(slip_id)?;
        state.db.get_generated_for_slip(slip_id)
    }

    /// Recompute total odds and estimated payout from the current
    /// selections. Best-effort: a failed write leaves the selections alone
    /// and is reported through the `synced` flag.
    fn sync_totals(state: &AppState, slip_id: i64) -> bool {
        match Self::recompute_totals(state, slip_id) {
            Ok(()) => true,
            Err(e) => {
                warn!(slip_id, error = %e, "Totals sync failed");
                false
            }
        }
    }

    fn recompute_totals(state: &AppState, slip_id: i64) -> Result<()> {
        let slip = state.db.get_slip(slip_id)?;
        let selections = state.db.get_selections(slip_id)?;

        let total_odds = if selections.is_empty() {
            0.0
        } else {
            round_to(selections.iter().map(|s| s.odds).product::<f64>(), 4)
        };
        let estimated_payout = round_to(total_odds * slip.stake, 2);

        state.db.update_totals(slip_id, total_odds, estimated_payout)?;
        state.invalidate_slip(slip_id);
        Ok(())
    }
}
