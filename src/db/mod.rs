//! SQLite database module

pub mod models;
mod generated;
mod jobs;
mod matches;
mod migrations;
mod slips;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

pub use jobs::generate_job_id;
use models::*;

use crate::error::Result;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database and bring the schema up to date
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for concurrent readers; cascades need foreign keys on
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Match Methods ==========

    pub fn create_match(&self, new: &NewMatchRecord) -> Result<MatchRecord> {
        let conn = self.conn.lock();
        matches::create_match(&conn, new)
    }

    pub fn get_match(&self, id: i64) -> Result<MatchRecord> {
        let conn = self.conn.lock();
        matches::get_match(&conn, id)
    }

    pub fn list_matches(&self) -> Result<Vec<MatchRecord>> {
        let conn = self.conn.lock();
        matches::list_matches(&conn)
    }

    pub fn get_matches_by_ids(&self, ids: &[i64]) -> Result<Vec<MatchRecord>> {
        let conn = self.conn.lock();
        matches::get_matches_by_ids(&conn, ids)
    }

    // ========== Slip Methods ==========

    pub fn create_slip(&self, stake: f64, currency: &str) -> Result<MasterSlip> {
        let conn = self.conn.lock();
        slips::create_slip(&conn, stake, currency)
    }

    pub fn get_slip(&self, id: i64) -> Result<MasterSlip> {
        let conn = self.conn.lock();
        slips::get_slip(&conn, id)
    }

    pub fn get_selections(&self, slip_id: i64) -> Result<Vec<SlipSelection>> {
        let conn = self.conn.lock();
        slips::get_selections(&conn, slip_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_selection(
        &self,
        slip_id: i64,
        match_id: i64,
        market: &str,
        selection: &str,
        odds: f64,
        analysis: Option<&serde_json::Value>,
        position: i64,
    ) -> Result<SlipSelection> {
        let conn = self.conn.lock();
        slips::add_selection(&conn, slip_id, match_id, market, selection, odds, analysis, position)
    }

    pub fn remove_selection(&self, slip_id: i64, match_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        slips::remove_selection(&conn, slip_id, match_id)
    }

    pub fn update_totals(&self, slip_id: i64, total_odds: f64, estimated_payout: f64) -> Result<()> {
        let conn = self.conn.lock();
        slips::update_totals(&conn, slip_id, total_odds, estimated_payout)
    }

    pub fn mark_slip_queued(&self, slip_id: i64, expected_version: i64) -> Result<()> {
        let conn = self.conn.lock();
        slips::mark_slip_queued(&conn, slip_id, expected_version)
    }

    pub fn mark_slip_processing(
        &self,
        slip_id: i64,
        expected_version: i64,
        started_at: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        slips::mark_slip_processing(&conn, slip_id, expected_version, started_at)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mark_slip_completed(
        &self,
        slip_id: i64,
        expected_version: i64,
        alternative_slips_count: i64,
        best_alternative_slip_id: Option<i64>,
        analysis_quality: AnalysisQuality,
        completed_at: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        slips::mark_slip_completed(
            &conn,
            slip_id,
            expected_version,
            alternative_slips_count,
            best_alternative_slip_id,
            analysis_quality,
            completed_at,
        )
    }

    pub fn mark_slip_failed(
        &self,
        slip_id: i64,
        expected_version: i64,
        error_message: &str,
        completed_at: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        slips::mark_slip_failed(&conn, slip_id, expected_version, error_message, completed_at)
    }

    // ========== Job Methods ==========

    pub fn create_job(
        &self,
        job_id: &str,
        master_slip_id: i64,
        strategy: &str,
        risk_profile: RiskLevel,
    ) -> Result<GeneratorJob> {
        let conn = self.conn.lock();
        jobs::create_job(&conn, job_id, master_slip_id, strategy, risk_profile)
    }

    pub fn create_job_and_queue_slip(
        &self,
        job_id: &str,
        master_slip_id: i64,
        strategy: &str,
        risk_profile: RiskLevel,
        expected_slip_version: i64,
    ) -> Result<GeneratorJob> {
        let mut conn = self.conn.lock();
        jobs::create_job_and_queue_slip(
            &mut conn,
            job_id,
            master_slip_id,
            strategy,
            risk_profile,
            expected_slip_version,
        )
    }

    pub fn get_job(&self, job_id: &str) -> Result<GeneratorJob> {
        let conn = self.conn.lock();
        jobs::get_job(&conn, job_id)
    }

    pub fn get_active_job_for_slip(&self, slip_id: i64) -> Result<Option<GeneratorJob>> {
        let conn = self.conn.lock();
        jobs::get_active_job_for_slip(&conn, slip_id)
    }

    pub fn try_mark_running(&self, job_id: &str, started_at: &str) -> Result<bool> {
        let conn = self.conn.lock();
        jobs::try_mark_running(&conn, job_id, started_at)
    }

    pub fn set_progress(&self, job_id: &str, progress: i64) -> Result<()> {
        let conn = self.conn.lock();
        jobs::set_progress(&conn, job_id, progress)
    }

    pub fn try_fail_job(&self, job_id: &str, error_message: &str, completed_at: &str) -> Result<bool> {
        let conn = self.conn.lock();
        jobs::try_fail_job(&conn, job_id, error_message, completed_at)
    }

    pub fn try_cancel_job(
        &self,
        job_id: &str,
        cancelled_by: &str,
        cancelled_at: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        jobs::try_cancel_job(&conn, job_id, cancelled_by, cancelled_at)
    }

    // ========== Generated Slip Methods ==========

    pub fn persist_job_results(
        &self,
        job_id: &str,
        master_slip_id: i64,
        candidates: &[NewGeneratedSlip],
        completed_at: &str,
    ) -> Result<Option<Vec<GeneratedSlip>>> {
        let mut conn = self.conn.lock();
        generated::persist_job_results(&mut conn, job_id, master_slip_id, candidates, completed_at)
    }

    pub fn get_generated_for_slip(&self, master_slip_id: i64) -> Result<Vec<GeneratedSlip>> {
        let conn = self.conn.lock();
        generated::get_generated_for_slip(&conn, master_slip_id)
    }

    pub fn get_generated_for_job(&self, job_id: &str) -> Result<Vec<GeneratedSlip>> {
        let conn = self.conn.lock();
        generated::get_generated_for_job(&conn, job_id)
    }
}

// ========== JSON column helpers ==========

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn json_col_opt<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

pub(crate) fn json_param<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::stats::RawFormEntry;

    fn open_db() -> (tempfile::TempDir, SqliteDb) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = SqliteDb::new(&dir.path().join("test.db")).expect("open db");
        (dir, db)
    }

    fn form_entry(outcome: &str) -> RawFormEntry {
        RawFormEntry {
            opponent: "Rivals".to_string(),
            result: "1-0".to_string(),
            outcome: outcome.to_string(),
            date: None,
        }
    }

    fn sample_candidate(confidence: f64) -> NewGeneratedSlip {
        NewGeneratedSlip {
            stake: 10.0,
            total_odds: 4.5,
            possible_return: 45.0,
            risk_level: RiskLevel::Medium,
            confidence_score: confidence,
            legs: vec![NewGeneratedSlipLeg {
                match_id: 1,
                market: "match_result".to_string(),
                selection: "home".to_string(),
                odds: 4.5,
            }],
        }
    }

    fn sample_match(db: &SqliteDb) -> MatchRecord {
        db.create_match(&NewMatchRecord {
            home_team: "Alpha".to_string(),
            away_team: "Beta".to_string(),
            league: Some("Premier".to_string()),
            kickoff_at: None,
            home_form: vec![form_entry("W"), form_entry("D")],
            away_form: vec![form_entry("L")],
            head_to_head: Vec::new(),
            markets: vec![MarketOdds {
                market_type: "match_result".to_string(),
                selection: "home".to_string(),
                odds: 1.85,
            }],
        })
        .expect("create match")
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        drop(SqliteDb::new(&path).expect("first open"));
        // Reopening runs the migration pass again over an up-to-date schema
        SqliteDb::new(&path).expect("second open");
    }

    #[test]
    fn match_json_columns_round_trip() {
        let (_dir, db) = open_db();
        let m = sample_match(&db);

        let loaded = db.get_match(m.id).expect("get match");
        assert_eq!(loaded.home_form.len(), 2);
        assert_eq!(loaded.home_form[0].outcome, "W");
        assert_eq!(loaded.markets[0].odds, 1.85);

        let found = db.get_matches_by_ids(&[m.id, 9999]).expect("by ids");
        assert_eq!(found.len(), 1);

        let err = db.get_match(9999).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn selections_enforce_uniqueness() {
        let (_dir, db) = open_db();
        let m = sample_match(&db);
        let slip = db.create_slip(25.0, "EUR").expect("create slip");
        assert_eq!(slip.status, SlipStatus::Pending);
        assert_eq!(slip.engine_status, EngineStatus::Idle);

        db.add_selection(slip.id, m.id, "match_result", "home", 1.85, None, 0)
            .expect("add selection");
        let dup = db
            .add_selection(slip.id, m.id, "match_result", "home", 1.85, None, 1)
            .unwrap_err();
        assert!(
            matches!(dup, AppError::Conflict(_)),
            "duplicate match on one slip must be rejected"
        );

        assert!(db.remove_selection(slip.id, m.id).expect("remove"));
        assert!(!db.remove_selection(slip.id, m.id).expect("second remove"));
    }

    #[test]
    fn slip_cas_rejects_stale_versions() {
        let (_dir, db) = open_db();
        let slip = db.create_slip(10.0, "EUR").expect("create slip");
        assert_eq!(slip.lock_version, 0);

        db.mark_slip_queued(slip.id, 0).expect("queue");
        let err = db
            .mark_slip_processing(slip.id, 0, "2026-08-25T12:00:00Z")
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        db.mark_slip_processing(slip.id, 1, "2026-08-25T12:00:00Z")
            .expect("processing with fresh version");
        let loaded = db.get_slip(slip.id).expect("get");
        assert_eq!(loaded.status, SlipStatus::Processing);
        assert_eq!(loaded.engine_status, EngineStatus::Processing);
        assert_eq!(loaded.lock_version, 2);
    }

    #[test]
    fn job_transitions_are_guarded() {
        let (_dir, db) = open_db();
        let slip = db.create_slip(10.0, "EUR").expect("create slip");
        let job_id = generate_job_id();
        assert!(job_id.starts_with("job_"));

        let job = db
            .create_job(&job_id, slip.id, "monte_carlo", RiskLevel::Medium)
            .expect("create job");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);

        let active = db.get_active_job_for_slip(slip.id).expect("active lookup");
        assert_eq!(active.map(|j| j.job_id), Some(job_id.clone()));

        assert!(db.try_mark_running(&job_id, "2026-08-25T12:00:00Z").expect("running"));
        // Duplicate delivery: already running, so the CAS misses
        assert!(!db.try_mark_running(&job_id, "2026-08-25T12:00:01Z").expect("rerun"));

        db.set_progress(&job_id, 70).expect("progress");
        let stored = db
            .persist_job_results(&job_id, slip.id, &[sample_candidate(0.61)], "2026-08-25T12:01:00Z")
            .expect("persist")
            .expect("job was running");
        assert_eq!(stored.len(), 1);
        assert!(!db
            .try_fail_job(&job_id, "too late", "2026-08-25T12:01:01Z")
            .expect("fail after complete"));

        let done = db.get_job(&job_id).expect("get job");
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.generated_slips, 1);
        assert!(db.get_active_job_for_slip(slip.id).expect("no active").is_none());
    }

    #[test]
    fn cancelled_job_is_not_picked_up() {
        let (_dir, db) = open_db();
        let slip = db.create_slip(10.0, "EUR").expect("create slip");
        let job_id = generate_job_id();
        db.create_job(&job_id, slip.id, "coverage", RiskLevel::Low)
            .expect("create job");

        assert!(db
            .try_cancel_job(&job_id, "user", "2026-08-25T12:00:00Z")
            .expect("cancel"));
        assert!(!db.try_mark_running(&job_id, "2026-08-25T12:00:05Z").expect("dequeue"));

        let job = db.get_job(&job_id).expect("get job");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.cancelled_by.as_deref(), Some("user"));
        assert_eq!(job.error_message.as_deref(), Some("Cancelled by user"));

        // Cancelling again is a no-op on a terminal job
        assert!(!db
            .try_cancel_job(&job_id, "user", "2026-08-25T12:00:10Z")
            .expect("second cancel"));
    }

    #[test]
    fn generated_slips_store_with_legs() {
        let (_dir, db) = open_db();
        let slip = db.create_slip(10.0, "EUR").expect("create slip");
        let job_id = generate_job_id();
        db.create_job(&job_id, slip.id, "monte_carlo", RiskLevel::Medium)
            .expect("create job");
        assert!(db.try_mark_running(&job_id, "2026-08-25T12:00:00Z").expect("running"));

        let candidates = vec![
            sample_candidate(0.61),
            NewGeneratedSlip {
                stake: 10.0,
                total_odds: 2.1,
                possible_return: 21.0,
                risk_level: RiskLevel::Low,
                confidence_score: 0.84,
                legs: vec![
                    NewGeneratedSlipLeg {
                        match_id: 1,
                        market: "over_under".to_string(),
                        selection: "over_2.5".to_string(),
                        odds: 1.5,
                    },
                    NewGeneratedSlipLeg {
                        match_id: 2,
                        market: "match_result".to_string(),
                        selection: "draw".to_string(),
                        odds: 1.4,
                    },
                ],
            },
        ];

        let stored = db
            .persist_job_results(&job_id, slip.id, &candidates, "2026-08-25T12:01:00Z")
            .expect("persist")
            .expect("job was running");
        assert_eq!(stored.len(), 2);

        let by_job = db.get_generated_for_job(&job_id).expect("by job");
        // Ordered by confidence, best first
        assert_eq!(by_job[0].confidence_score, 0.84);
        assert_eq!(by_job[0].legs.len(), 2);
        assert_eq!(by_job[1].legs.len(), 1);

        let by_slip = db.get_generated_for_slip(slip.id).expect("by slip");
        assert_eq!(by_slip.len(), 2);
    }

    #[test]
    fn results_for_non_running_jobs_are_dropped() {
        let (_dir, db) = open_db();
        let slip = db.create_slip(10.0, "EUR").expect("create slip");
        let job_id = generate_job_id();
        db.create_job(&job_id, slip.id, "monte_carlo", RiskLevel::Medium)
            .expect("create job");
        assert!(db.try_mark_running(&job_id, "2026-08-25T12:00:00Z").expect("running"));
        assert!(db
            .try_cancel_job(&job_id, "user", "2026-08-25T12:00:30Z")
            .expect("cancel"));

        let stored = db
            .persist_job_results(&job_id, slip.id, &[sample_candidate(0.7)], "2026-08-25T12:01:00Z")
            .expect("persist");
        assert!(stored.is_none(), "cancelled job must not accept results");

        let job = db.get_job(&job_id).expect("get job");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(db.get_generated_for_job(&job_id).expect("by job").is_empty());
    }
}
