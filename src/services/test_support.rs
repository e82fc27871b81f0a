//! Shared fixtures for service tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::models::{MarketOdds, MatchRecord, NewMatchRecord};
use crate::db::SqliteDb;
use crate::engine::{
    CandidateLeg, EngineRequest, EngineResponse, PredictionEngine, SlipCandidate,
};
use crate::error::{AppError, Result};
use crate::queue::JobQueue;
use crate::services::betslip_service::BetslipService;
use crate::services::match_service::MatchService;
use crate::state::AppState;
use crate::stats::RawFormEntry;

pub enum ScriptedReply {
    Slips(Vec<SlipCandidate>),
    Error(AppError),
}

/// Engine double replaying a scripted sequence of replies
pub struct ScriptedEngine {
    script: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedEngine {
    pub fn new(replies: Vec<ScriptedReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into()),
        })
    }

    pub fn with_candidates(candidates: Vec<SlipCandidate>) -> Arc<Self> {
        Self::new(vec![ScriptedReply::Slips(candidates)])
    }
}

#[async_trait]
impl PredictionEngine for ScriptedEngine {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn generate_slips(&self, _request: &EngineRequest) -> Result<EngineResponse> {
        match self.script.lock().pop_front() {
            Some(ScriptedReply::Slips(slips)) => Ok(EngineResponse {
                alternative_slips: slips,
            }),
            Some(ScriptedReply::Error(e)) => Err(e),
            None => Err(AppError::Engine("Scripted engine exhausted".to_string())),
        }
    }
}

/// Engine double that cancels its own job before answering, simulating a
/// user cancel racing the engine call
pub struct CancellingEngine {
    pub db: Arc<SqliteDb>,
    pub candidates: Vec<SlipCandidate>,
}

#[async_trait]
impl PredictionEngine for CancellingEngine {
    fn id(&self) -> &'static str {
        "cancelling"
    }

    async fn generate_slips(&self, request: &EngineRequest) -> Result<EngineResponse> {
        self.db
            .try_cancel_job(&request.job_id, "user", &Utc::now().to_rfc3339())?;
        Ok(EngineResponse {
            alternative_slips: self.candidates.clone(),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        bind: "127.0.0.1:0".parse().expect("bind addr"),
        db_path: "unused.db".to_string(),
        engine_url: url::Url::parse("http://127.0.0.1:9/api/generate-slips").expect("url"),
        engine_timeout_secs: 5,
        worker_count: 1,
        dispatch_delay_secs: 0,
    }
}

/// State over a throwaway database and an inert engine
pub fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
    test_state_with_engine(ScriptedEngine::new(Vec::new()))
}

pub fn test_state_with_engine(
    engine: Arc<dyn PredictionEngine>,
) -> (tempfile::TempDir, Arc<AppState>) {
    test_state_with_db_engine(move |_| engine)
}

/// State whose engine is built against the freshly opened database, for
/// doubles that need to reach back into storage
pub fn test_state_with_db_engine(
    build_engine: impl FnOnce(Arc<SqliteDb>) -> Arc<dyn PredictionEngine>,
) -> (tempfile::TempDir, Arc<AppState>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(SqliteDb::new(&dir.path().join("test.db")).expect("open db"));
    let engine = build_engine(Arc::clone(&db));
    let state = Arc::new(AppState::new(
        test_config(),
        db,
        engine,
        Arc::new(JobQueue::new()),
    ));
    (dir, state)
}

fn form_entry(result: &str, outcome: &str) -> RawFormEntry {
    RawFormEntry {
        opponent: "Rivals".to_string(),
        result: result.to_string(),
        outcome: outcome.to_string(),
        date: None,
    }
}

/// A match record with plausible form and a three-way result market
pub fn seed_match(state: &AppState, home: &str, away: &str) -> MatchRecord {
    MatchService::create(
        state,
        NewMatchRecord {
            home_team: home.to_string(),
            away_team: away.to_string(),
            league: Some("Test League".to_string()),
            kickoff_at: None,
            home_form: vec![
                form_entry("2-0", "W"),
                form_entry("1-1", "D"),
                form_entry("0-1", "L"),
            ],
            away_form: vec![form_entry("3-1", "W"), form_entry("0-2", "L")],
            head_to_head: Vec::new(),
            markets: vec![
                MarketOdds {
                    market_type: "match_result".to_string(),
                    selection: "home".to_string(),
                    odds: 1.85,
                },
                MarketOdds {
                    market_type: "match_result".to_string(),
                    selection: "draw".to_string(),
                    odds: 3.4,
                },
                MarketOdds {
                    market_type: "match_result".to_string(),
                    selection: "away".to_string(),
                    odds: 4.2,
                },
            ],
        },
    )
    .expect("seed match")
}

/// A slip carrying `selections` distinct match selections
pub fn ready_slip(state: &AppState, selections: usize) -> i64 {
    let slip = BetslipService::create_slip(state, Some(10.0), None).expect("create slip");
    for i in 0..selections {
        let record = seed_match(state, &format!("Home {}", i), &format!("Away {}", i));
        BetslipService::add_match(state, slip.id, record.id, "match_result", "home", 1.85)
            .expect("add selection");
    }
    slip.id
}

/// An engine candidate with one leg and the given confidence and odds
pub fn candidate(confidence: f64, total_odds: f64) -> SlipCandidate {
    SlipCandidate {
        stake: None,
        total_odds,
        potential_return: total_odds * 10.0,
        confidence_score: confidence,
        risk_level: crate::db::models::RiskLevel::Medium,
        selections: vec![CandidateLeg {
            match_id: 1,
            market: "match_result".to_string(),
            selection: "home".to_string(),
            odds: total_odds,
        }],
    }
}
