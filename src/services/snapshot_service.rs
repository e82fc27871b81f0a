//! Snapshot Service
//!
//! Assembles the statistical context the prediction engine consumes: per
//! selection, the two teams' form snapshots, the head-to-head summary, the
//! selected market with its implied probability and the full market board.

use std::collections::{BTreeMap, HashMap};

use crate::db::models::{MatchRecord, SlipSelection};
use crate::db::SqliteDb;
use crate::engine::{MarketQuote, MatchSnapshot, ModelInputs, SelectedMarket};
use crate::error::{AppError, Result};
use crate::stats::{aggregate_meetings, compute_form, implied_probability};

pub struct SnapshotService;

impl SnapshotService {
    /// Snapshot every selection on a slip. Match records are loaded in one
    /// query; a selection pointing at a vanished match is an error.
    pub fn build_snapshots(
        db: &SqliteDb,
        selections: &[SlipSelection],
    ) -> Result<Vec<MatchSnapshot>> {
        let ids: Vec<i64> = selections.iter().map(|s| s.match_id).collect();
        let records = db.get_matches_by_ids(&ids)?;
        let by_id: HashMap<i64, &MatchRecord> = records.iter().map(|m| (m.id, m)).collect();

        selections
            .iter()
            .map(|sel| {
                let record = by_id.get(&sel.match_id).ok_or_else(|| {
                    AppError::NotFound(format!("Match not found: {}", sel.match_id))
                })?;
                Ok(Self::build_snapshot(record, sel))
            })
            .collect()
    }

    /// Snapshot a single selection against its match record
    pub fn build_snapshot(record: &MatchRecord, selection: &SlipSelection) -> MatchSnapshot {
        let mut markets: BTreeMap<String, Vec<MarketQuote>> = BTreeMap::new();
        for market in &record.markets {
            markets
                .entry(normalize_market(&market.market_type))
                .or_default()
                .push(MarketQuote {
                    selection: market.selection.clone(),
                    odds: market.odds,
                    implied_probability: implied_probability(market.odds),
                });
        }

        MatchSnapshot {
            match_id: record.id,
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            home_form: compute_form(&record.home_form),
            away_form: compute_form(&record.away_form),
            head_to_head: aggregate_meetings(&record.head_to_head),
            selected_market: SelectedMarket {
                market_type: selection.market.clone(),
                selection: selection.selection.clone(),
                odds: selection.odds,
                implied_probability: implied_probability(selection.odds),
            },
            markets,
            model_inputs: ModelInputs::default(),
        }
    }

    /// Compact stats snapshot stored on the selection row at add time
    pub fn selection_analysis(
        record: &MatchRecord,
        market: &str,
        selection: &str,
        odds: f64,
    ) -> serde_json::Value {
        let home = compute_form(&record.home_form);
        let away = compute_form(&record.away_form);
        let h2h = aggregate_meetings(&record.head_to_head);

        serde_json::json!({
            "market": market,
            "selection": selection,
            "odds": odds,
            "implied_probability": implied_probability(odds),
            "home_form_rating": home.form_rating,
            "away_form_rating": away.form_rating,
            "home_form_string": home.form_string,
            "away_form_string": away.form_string,
            "h2h_form": h2h.form_string,
        })
    }
}

fn normalize_market(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}
