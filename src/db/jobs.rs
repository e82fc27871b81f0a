//! Generator job storage
//!
//! Job status transitions are guarded SQL updates: each one names the
//! states it may leave from, so a stale worker or a late engine response
//! can never resurrect a terminal job. The running → completed transition
//! lives in [`crate::db::generated`], inside the same transaction that
//! stores the results.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::models::{GeneratorJob, JobStatus, RiskLevel};
use crate::error::{AppError, Result};

const JOB_COLUMNS: &str = "id, job_id, master_slip_id, strategy, risk_profile, status, progress,
         total_slips, generated_slips, error_message, started_at, completed_at,
         cancelled_at, cancelled_by, created_at, updated_at";

/// Generate a fresh job identifier, e.g. `job_5f3a9c21d4b0`
pub fn generate_job_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("job_{}", &hex[..12])
}

fn map_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<GeneratorJob> {
    Ok(GeneratorJob {
        id: row.get(0)?,
        job_id: row.get(1)?,
        master_slip_id: row.get(2)?,
        strategy: row.get(3)?,
        risk_profile: row.get(4)?,
        status: row.get(5)?,
        progress: row.get(6)?,
        total_slips: row.get(7)?,
        generated_slips: row.get(8)?,
        error_message: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        cancelled_at: row.get(12)?,
        cancelled_by: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Create a job in `pending`
pub fn create_job(
    conn: &Connection,
    job_id: &str,
    master_slip_id: i64,
    strategy: &str,
    risk_profile: RiskLevel,
) -> Result<GeneratorJob> {
    insert_job(conn, job_id, master_slip_id, strategy, risk_profile)?;
    get_job(conn, job_id)
}

/// Atomically queue a slip for analysis and create its pending job.
///
/// The slip write is a `lock_version` CAS and the insert runs against a
/// partial unique index on active jobs, so two concurrent triggers cannot
/// both get a job row; the loser sees a Conflict and the transaction rolls
/// back.
pub fn create_job_and_queue_slip(
    conn: &mut Connection,
    job_id: &str,
    master_slip_id: i64,
    strategy: &str,
    risk_profile: RiskLevel,
    expected_slip_version: i64,
) -> Result<GeneratorJob> {
    let tx = conn.transaction()?;

    super::slips::mark_slip_queued(&tx, master_slip_id, expected_slip_version)?;
    insert_job(&tx, job_id, master_slip_id, strategy, risk_profile)?;
    let job = get_job(&tx, job_id)?;

    tx.commit()?;
    Ok(job)
}

fn insert_job(
    conn: &Connection,
    job_id: &str,
    master_slip_id: i64,
    strategy: &str,
    risk_profile: RiskLevel,
) -> Result<()> {
    conn.execute(
        "INSERT INTO generator_jobs (job_id, master_slip_id, strategy, risk_profile)
         VALUES (?, ?, ?, ?)",
        rusqlite::params![job_id, master_slip_id, strategy, risk_profile.as_str()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(format!(
                "An active generation job already exists for slip {}",
                master_slip_id
            ))
        }
        _ => e.into(),
    })?;
    Ok(())
}

/// Get a job by its string job_id
pub fn get_job(conn: &Connection, job_id: &str) -> Result<GeneratorJob> {
    conn.query_row(
        &format!("SELECT {} FROM generator_jobs WHERE job_id = ?", JOB_COLUMNS),
        [job_id],
        map_job,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Job not found: {}", job_id))
        }
        _ => e.into(),
    })
}

/// The pending or running job for a slip, if one exists. At most one can be
/// active at a time; triggering checks this before creating a new job.
pub fn get_active_job_for_slip(conn: &Connection, slip_id: i64) -> Result<Option<GeneratorJob>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM generator_jobs
         WHERE master_slip_id = ? AND status IN ('pending', 'running')
         ORDER BY created_at DESC LIMIT 1",
        JOB_COLUMNS
    ))?;

    let mut rows = stmt.query_map([slip_id], map_job)?;
    match rows.next() {
        Some(job) => Ok(Some(job?)),
        None => Ok(None),
    }
}

/// Pending → running. Returns false when the job is no longer pending
/// (cancelled before dequeue, or a duplicate delivery).
pub fn try_mark_running(conn: &Connection, job_id: &str, started_at: &str) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE generator_jobs
         SET status = ?, started_at = ?, progress = 10, updated_at = datetime('now')
         WHERE job_id = ? AND status = ?",
        rusqlite::params![
            JobStatus::Running.as_str(),
            started_at,
            job_id,
            JobStatus::Pending.as_str()
        ],
    )?;
    Ok(rows > 0)
}

/// Progress update, only meaningful while running
pub fn set_progress(conn: &Connection, job_id: &str, progress: i64) -> Result<()> {
    conn.execute(
        "UPDATE generator_jobs SET progress = ?, updated_at = datetime('now')
         WHERE job_id = ? AND status = ?",
        rusqlite::params![progress, job_id, JobStatus::Running.as_str()],
    )?;
    Ok(())
}

/// Pending/running → failed. Terminal jobs are left untouched.
pub fn try_fail_job(
    conn: &Connection,
    job_id: &str,
    error_message: &str,
    completed_at: &str,
) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE generator_jobs
         SET status = ?, error_message = ?, completed_at = ?, updated_at = datetime('now')
         WHERE job_id = ? AND status IN ('pending', 'running')",
        rusqlite::params![JobStatus::Failed.as_str(), error_message, completed_at, job_id],
    )?;
    Ok(rows > 0)
}

/// Pending/running → cancelled. Returns false for jobs already terminal.
pub fn try_cancel_job(
    conn: &Connection,
    job_id: &str,
    cancelled_by: &str,
    cancelled_at: &str,
) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE generator_jobs
         SET status = ?, cancelled_at = ?, cancelled_by = ?, error_message = ?,
             updated_at = datetime('now')
         WHERE job_id = ? AND status IN ('pending', 'running')",
        rusqlite::params![
            JobStatus::Cancelled.as_str(),
            cancelled_at,
            cancelled_by,
            "Cancelled by user",
            job_id
        ],
    )?;
    Ok(rows > 0)
}
