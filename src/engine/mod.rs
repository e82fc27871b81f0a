//! Prediction engine integration
//!
//! The external ML engine is an opaque collaborator behind the
//! [`PredictionEngine`] trait: it receives the statistical snapshot of a
//! master slip and answers with zero or more alternative slip candidates.
//! The HTTP implementation lives in [`http`]; tests substitute their own.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::models::RiskLevel;
use crate::error::Result;
use crate::stats::{HeadToHeadSummary, TeamFormSnapshot};

/// Relative weights the engine is told to apply to each signal
pub const HOME_FORM_WEIGHT: f64 = 0.35;
pub const AWAY_FORM_WEIGHT: f64 = 0.25;
pub const H2H_WEIGHT: f64 = 0.15;
/// Base home venue advantage factor
pub const VENUE_ADVANTAGE: f64 = 0.70;
/// League-average expected goals per match
pub const EXPECTED_GOALS: f64 = 2.5;
pub const VOLATILITY_SCORE: f64 = 3.0;

/// The market the user actually picked, with its implied probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMarket {
    pub market_type: String,
    pub selection: String,
    pub odds: f64,
    pub implied_probability: f64,
}

/// Model tuning constants shipped alongside every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInputs {
    pub home_form_weight: f64,
    pub away_form_weight: f64,
    pub h2h_weight: f64,
    pub venue_advantage: f64,
    pub expected_goals: f64,
    pub volatility_score: f64,
}

impl Default for ModelInputs {
    fn default() -> Self {
        Self {
            home_form_weight: HOME_FORM_WEIGHT,
            away_form_weight: AWAY_FORM_WEIGHT,
            h2h_weight: H2H_WEIGHT,
            venue_advantage: VENUE_ADVANTAGE,
            expected_goals: EXPECTED_GOALS,
            volatility_score: VOLATILITY_SCORE,
        }
    }
}

/// Complete statistical context for one selected match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub home_form: TeamFormSnapshot,
    pub away_form: TeamFormSnapshot,
    pub head_to_head: HeadToHeadSummary,
    pub selected_market: SelectedMarket,
    /// All known markets grouped by normalized market type
    pub markets: BTreeMap<String, Vec<MarketQuote>>,
    pub model_inputs: ModelInputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub selection: String,
    pub odds: f64,
    pub implied_probability: f64,
}

/// Request payload for slip generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRequest {
    pub job_id: String,
    pub master_slip_id: i64,
    pub stake: f64,
    pub currency: String,
    pub strategy: String,
    pub risk_profile: RiskLevel,
    pub total_matches: usize,
    pub match_snapshots: Vec<MatchSnapshot>,
    pub created_at: String,
}

/// Engine answer: candidate alternative slips
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResponse {
    #[serde(alias = "generated_slips")]
    pub alternative_slips: Vec<SlipCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlipCandidate {
    /// Candidate stake; the master slip's stake applies when omitted
    #[serde(default)]
    pub stake: Option<f64>,
    pub total_odds: f64,
    #[serde(alias = "possible_return")]
    pub potential_return: f64,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default = "default_risk_level")]
    pub risk_level: RiskLevel,
    #[serde(alias = "legs")]
    pub selections: Vec<CandidateLeg>,
}

fn default_risk_level() -> RiskLevel {
    RiskLevel::Medium
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLeg {
    pub match_id: i64,
    pub market: String,
    pub selection: String,
    pub odds: f64,
}

/// Seam to the external prediction engine
#[async_trait]
pub trait PredictionEngine: Send + Sync {
    /// Engine identifier for logs
    fn id(&self) -> &'static str;

    /// Submit a generation request and await the candidate slips
    async fn generate_slips(&self, request: &EngineRequest) -> Result<EngineResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_accepts_both_field_spellings() {
        let body = r#"{
            "generated_slips": [
                {
                    "total_odds": 3.2,
                    "possible_return": 32.0,
                    "confidence_score": 0.72,
                    "risk_level": "low",
                    "legs": [
                        {"match_id": 1, "market": "match_result", "selection": "home", "odds": 1.6},
                        {"match_id": 2, "market": "match_result", "selection": "draw", "odds": 2.0}
                    ]
                }
            ]
        }"#;

        let parsed: EngineResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.alternative_slips.len(), 1);
        let candidate = &parsed.alternative_slips[0];
        assert_eq!(candidate.potential_return, 32.0);
        assert_eq!(candidate.risk_level, RiskLevel::Low);
        assert_eq!(candidate.selections.len(), 2);
        assert_eq!(candidate.stake, None);
    }

    #[test]
    fn candidate_defaults() {
        let body = r#"{
            "alternative_slips": [
                {
                    "total_odds": 2.0,
                    "potential_return": 20.0,
                    "selections": []
                }
            ]
        }"#;

        let parsed: EngineResponse = serde_json::from_str(body).expect("parse");
        let candidate = &parsed.alternative_slips[0];
        assert_eq!(candidate.confidence_score, 0.0);
        assert_eq!(candidate.risk_level, RiskLevel::Medium);
    }
}
