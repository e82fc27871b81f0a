//! Match Service
//!
//! Ingest and reads for match records, the raw material the stats engines
//! and the betslip pipeline consume.

use tracing::info;

use crate::db::models::{MatchRecord, NewMatchRecord};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Match record service for business logic
pub struct MatchService;

impl MatchService {
    /// Store a new match record. Form entries are kept raw; the stats
    /// engines filter invalid ones at computation time.
    pub fn create(state: &AppState, new: NewMatchRecord) -> Result<MatchRecord> {
        if new.home_team.trim().is_empty() || new.away_team.trim().is_empty() {
            return Err(AppError::Validation(
                "Both team names are required".to_string(),
            ));
        }
        for market in &new.markets {
            if !market.odds.is_finite() || market.odds <= 1.0 {
                return Err(AppError::Validation(format!(
                    "Market odds must be above 1.0, got {} for {}",
                    market.odds, market.market_type
                )));
            }
        }

        let record = state.db.create_match(&new)?;
        info!(
            match_id = record.id,
            home = %record.home_team,
            away = %record.away_team,
            "Created match record"
        );
        Ok(record)
    }

    pub fn get(state: &AppState, id: i64) -> Result<MatchRecord> {
        state.db.get_match(id)
    }

    pub fn list(state: &AppState) -> Result<Vec<MatchRecord>> {
        state.db.list_matches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MarketOdds;
    use crate::services::test_support::test_state;

    #[test]
    fn create_validates_teams_and_odds() {
        let (_dir, state) = test_state();

        let blank = MatchService::create(
            &state,
            NewMatchRecord {
                home_team: " ".to_string(),
                away_team: "Beta".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(blank, AppError::Validation(_)));

        let bad_odds = MatchService::create(
            &state,
            NewMatchRecord {
                home_team: "Alpha".to_string(),
                away_team: "Beta".to_string(),
                markets: vec![MarketOdds {
                    market_type: "match_result".to_string(),
                    selection: "home".to_string(),
                    odds: 1.0,
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(bad_odds, AppError::Validation(_)));

        let ok = MatchService::create(
            &state,
            NewMatchRecord {
                home_team: "Alpha".to_string(),
                away_team: "Beta".to_string(),
                ..Default::default()
            },
        )
        .expect("create");
        assert_eq!(MatchService::list(&state).expect("list").len(), 1);
        assert_eq!(MatchService::get(&state, ok.id).expect("get").id, ok.id);
    }
}
