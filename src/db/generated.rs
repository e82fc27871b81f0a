//! Generated slip storage

use rusqlite::Connection;

use crate::db::models::{GeneratedSlip, GeneratedSlipLeg, JobStatus, NewGeneratedSlip};
use crate::error::Result;

/// Complete a running job and store its engine candidates in one
/// transaction. The completion is a guarded update (running only), so a job
/// cancelled or failed in the meantime keeps its state and nothing is
/// written; in that case `None` comes back and the caller drops the results.
pub fn persist_job_results(
    conn: &mut Connection,
    job_id: &str,
    master_slip_id: i64,
    candidates: &[NewGeneratedSlip],
    completed_at: &str,
) -> Result<Option<Vec<GeneratedSlip>>> {
    let tx = conn.transaction()?;

    let rows = tx.execute(
        "UPDATE generator_jobs
         SET status = ?, progress = 100, total_slips = ?, generated_slips = ?,
             completed_at = ?, updated_at = datetime('now')
         WHERE job_id = ? AND status = ?",
        rusqlite::params![
            JobStatus::Completed.as_str(),
            candidates.len() as i64,
            candidates.len() as i64,
            completed_at,
            job_id,
            JobStatus::Running.as_str()
        ],
    )?;
    if rows == 0 {
        return Ok(None);
    }

    let mut ids = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        tx.execute(
            "INSERT INTO generated_slips
                 (master_slip_id, job_id, stake, total_odds, possible_return,
                  risk_level, confidence_score)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                master_slip_id,
                job_id,
                candidate.stake,
                candidate.total_odds,
                candidate.possible_return,
                candidate.risk_level.as_str(),
                candidate.confidence_score,
            ],
        )?;
        let slip_id = tx.last_insert_rowid();

        for leg in &candidate.legs {
            tx.execute(
                "INSERT INTO generated_slip_legs
                     (generated_slip_id, match_id, market, selection, odds)
                 VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![slip_id, leg.match_id, leg.market, leg.selection, leg.odds],
            )?;
        }
        ids.push(slip_id);
    }

    tx.commit()?;

    let mut stored = Vec::with_capacity(ids.len());
    for id in ids {
        stored.push(get_generated_slip(conn, id)?);
    }
    Ok(Some(stored))
}

fn map_generated(row: &rusqlite::Row<'_>) -> rusqlite::Result<GeneratedSlip> {
    Ok(GeneratedSlip {
        id: row.get(0)?,
        master_slip_id: row.get(1)?,
        job_id: row.get(2)?,
        stake: row.get(3)?,
        total_odds: row.get(4)?,
        possible_return: row.get(5)?,
        risk_level: row.get(6)?,
        confidence_score: row.get(7)?,
        created_at: row.get(8)?,
        legs: Vec::new(),
    })
}

fn load_legs(conn: &Connection, generated_slip_id: i64) -> Result<Vec<GeneratedSlipLeg>> {
    let mut stmt = conn.prepare(
        "SELECT id, generated_slip_id, match_id, market, selection, odds
         FROM generated_slip_legs WHERE generated_slip_id = ? ORDER BY id",
    )?;

    let legs = stmt
        .query_map([generated_slip_id], |row| {
            Ok(GeneratedSlipLeg {
                id: row.get(0)?,
                generated_slip_id: row.get(1)?,
                match_id: row.get(2)?,
                market: row.get(3)?,
                selection: row.get(4)?,
                odds: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(legs)
}

fn get_generated_slip(conn: &Connection, id: i64) -> Result<GeneratedSlip> {
    let mut slip = conn.query_row(
        "SELECT id, master_slip_id, job_id, stake, total_odds, possible_return,
                risk_level, confidence_score, created_at
         FROM generated_slips WHERE id = ?",
        [id],
        map_generated,
    )?;
    slip.legs = load_legs(conn, id)?;
    Ok(slip)
}

fn attach_legs(conn: &Connection, mut slips: Vec<GeneratedSlip>) -> Result<Vec<GeneratedSlip>> {
    for slip in &mut slips {
        slip.legs = load_legs(conn, slip.id)?;
    }
    Ok(slips)
}

/// All generated slips for a master slip, best confidence first
pub fn get_generated_for_slip(conn: &Connection, master_slip_id: i64) -> Result<Vec<GeneratedSlip>> {
    let mut stmt = conn.prepare(
        "SELECT id, master_slip_id, job_id, stake, total_odds, possible_return,
                risk_level, confidence_score, created_at
         FROM generated_slips WHERE master_slip_id = ?
         ORDER BY confidence_score DESC, id",
    )?;

    let slips = stmt
        .query_map([master_slip_id], map_generated)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_legs(conn, slips)
}

/// Generated slips produced by one job, best confidence first
pub fn get_generated_for_job(conn: &Connection, job_id: &str) -> Result<Vec<GeneratedSlip>> {
    let mut stmt = conn.prepare(
        "SELECT id, master_slip_id, job_id, stake, total_odds, possible_return,
                risk_level, confidence_score, created_at
         FROM generated_slips WHERE job_id = ?
         ORDER BY confidence_score DESC, id",
    )?;

    let slips = stmt
        .query_map([job_id], map_generated)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_legs(conn, slips)
}
