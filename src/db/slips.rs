//! Master slip and selection storage
//!
//! Status-bearing fields on `master_slips` only change through the
//! `mark_slip_*` functions, each of which is a compare-and-set on
//! `lock_version`. A lost CAS surfaces as a Conflict instead of silently
//! overwriting another writer.

use rusqlite::Connection;

use crate::db::json_col_opt;
use crate::db::models::{
    AnalysisQuality, EngineStatus, MasterSlip, SlipSelection, SlipStatus,
};
use crate::error::{AppError, Result};

const SLIP_COLUMNS: &str = "id, stake, currency, status, engine_status, analysis_quality,
         error_message, total_odds, estimated_payout, alternative_slips_count,
         best_alternative_slip_id, processing_started_at, processing_completed_at,
         lock_version, created_at, updated_at";

fn map_slip(row: &rusqlite::Row<'_>) -> rusqlite::Result<MasterSlip> {
    Ok(MasterSlip {
        id: row.get(0)?,
        stake: row.get(1)?,
        currency: row.get(2)?,
        status: row.get(3)?,
        engine_status: row.get(4)?,
        analysis_quality: row.get(5)?,
        error_message: row.get(6)?,
        total_odds: row.get(7)?,
        estimated_payout: row.get(8)?,
        alternative_slips_count: row.get(9)?,
        best_alternative_slip_id: row.get(10)?,
        processing_started_at: row.get(11)?,
        processing_completed_at: row.get(12)?,
        lock_version: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Create a new master slip
pub fn create_slip(conn: &Connection, stake: f64, currency: &str) -> Result<MasterSlip> {
    conn.execute(
        "INSERT INTO master_slips (stake, currency) VALUES (?, ?)",
        rusqlite::params![stake, currency],
    )?;

    get_slip(conn, conn.last_insert_rowid())
}

/// Get a slip by ID
pub fn get_slip(conn: &Connection, id: i64) -> Result<MasterSlip> {
    conn.query_row(
        &format!("SELECT {} FROM master_slips WHERE id = ?", SLIP_COLUMNS),
        [id],
        map_slip,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Slip not found: {}", id))
        }
        _ => e.into(),
    })
}

// ========== Selections ==========

fn map_selection(row: &rusqlite::Row<'_>) -> rusqlite::Result<SlipSelection> {
    Ok(SlipSelection {
        id: row.get(0)?,
        slip_id: row.get(1)?,
        match_id: row.get(2)?,
        market: row.get(3)?,
        selection: row.get(4)?,
        odds: row.get(5)?,
        analysis: json_col_opt(row, 6)?,
        position: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Selections for a slip in the order they were added
pub fn get_selections(conn: &Connection, slip_id: i64) -> Result<Vec<SlipSelection>> {
    let mut stmt = conn.prepare(
        "SELECT id, slip_id, match_id, market, selection, odds, analysis, position, created_at
         FROM slip_selections WHERE slip_id = ? ORDER BY position, id",
    )?;

    let selections = stmt
        .query_map([slip_id], map_selection)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(selections)
}

/// Add a selection to a slip. The (slip_id, match_id) uniqueness is also
/// enforced by the schema; callers check for duplicates first to report a
/// clean conflict.
pub fn add_selection(
    conn: &Connection,
    slip_id: i64,
    match_id: i64,
    market: &str,
    selection: &str,
    odds: f64,
    analysis: Option<&serde_json::Value>,
    position: i64,
) -> Result<SlipSelection> {
    let analysis_json = match analysis {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    };

    conn.execute(
        "INSERT INTO slip_selections (slip_id, match_id, market, selection, odds, analysis, position)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![slip_id, match_id, market, selection, odds, analysis_json, position],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(format!("Match {} is already on slip {}", match_id, slip_id))
        }
        _ => e.into(),
    })?;
    let id = conn.last_insert_rowid();

    conn.query_row(
        "SELECT id, slip_id, match_id, market, selection, odds, analysis, position, created_at
         FROM slip_selections WHERE id = ?",
        [id],
        map_selection,
    )
    .map_err(Into::into)
}

/// Remove a selection by match identity. Returns whether a row was removed.
pub fn remove_selection(conn: &Connection, slip_id: i64, match_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM slip_selections WHERE slip_id = ? AND match_id = ?",
        rusqlite::params![slip_id, match_id],
    )?;
    Ok(rows > 0)
}

/// Sync the derived totals after a selection change. Not versioned: totals
/// are a best-effort mirror of the selections, not a status field.
pub fn update_totals(
    conn: &Connection,
    slip_id: i64,
    total_odds: f64,
    estimated_payout: f64,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE master_slips
         SET total_odds = ?, estimated_payout = ?, updated_at = datetime('now')
         WHERE id = ?",
        rusqlite::params![total_odds, estimated_payout, slip_id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Slip not found: {}", slip_id)));
    }
    Ok(())
}

// ========== Versioned status transitions ==========

fn cas_guard(rows: usize, slip_id: i64) -> Result<()> {
    if rows == 0 {
        return Err(AppError::Conflict(format!(
            "Slip {} was modified concurrently",
            slip_id
        )));
    }
    Ok(())
}

/// Queued for analysis: engine_status only, user-visible status unchanged
pub fn mark_slip_queued(conn: &Connection, slip_id: i64, expected_version: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE master_slips
         SET engine_status = ?, error_message = NULL,
             lock_version = lock_version + 1, updated_at = datetime('now')
         WHERE id = ? AND lock_version = ?",
        rusqlite::params![EngineStatus::Queued.as_str(), slip_id, expected_version],
    )?;
    cas_guard(rows, slip_id)
}

/// The job picked the slip up
pub fn mark_slip_processing(
    conn: &Connection,
    slip_id: i64,
    expected_version: i64,
    started_at: &str,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE master_slips
         SET status = ?, engine_status = ?, processing_started_at = ?,
             processing_completed_at = NULL,
             lock_version = lock_version + 1, updated_at = datetime('now')
         WHERE id = ? AND lock_version = ?",
        rusqlite::params![
            SlipStatus::Processing.as_str(),
            EngineStatus::Processing.as_str(),
            started_at,
            slip_id,
            expected_version
        ],
    )?;
    cas_guard(rows, slip_id)
}

/// Analysis finished with stored candidates
#[allow(clippy::too_many_arguments)]
pub fn mark_slip_completed(
    conn: &Connection,
    slip_id: i64,
    expected_version: i64,
    alternative_slips_count: i64,
    best_alternative_slip_id: Option<i64>,
    analysis_quality: AnalysisQuality,
    completed_at: &str,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE master_slips
         SET status = ?, engine_status = ?, analysis_quality = ?,
             alternative_slips_count = ?, best_alternative_slip_id = ?,
             processing_completed_at = ?, error_message = NULL,
             lock_version = lock_version + 1, updated_at = datetime('now')
         WHERE id = ? AND lock_version = ?",
        rusqlite::params![
            SlipStatus::Completed.as_str(),
            EngineStatus::Completed.as_str(),
            analysis_quality.as_str(),
            alternative_slips_count,
            best_alternative_slip_id,
            completed_at,
            slip_id,
            expected_version
        ],
    )?;
    cas_guard(rows, slip_id)
}

/// Analysis failed; selections stay untouched
pub fn mark_slip_failed(
    conn: &Connection,
    slip_id: i64,
    expected_version: i64,
    error_message: &str,
    completed_at: &str,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE master_slips
         SET status = ?, engine_status = ?, error_message = ?,
             processing_completed_at = ?,
             lock_version = lock_version + 1, updated_at = datetime('now')
         WHERE id = ? AND lock_version = ?",
        rusqlite::params![
            SlipStatus::Failed.as_str(),
            EngineStatus::Failed.as_str(),
            error_message,
            completed_at,
            slip_id,
            expected_version
        ],
    )?;
    cas_guard(rows, slip_id)
}
