//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_matches", CREATE_MATCHES_TABLE)?;
    run_migration(conn, "002_master_slips", CREATE_MASTER_SLIPS_TABLE)?;
    run_migration(conn, "003_slip_selections", CREATE_SLIP_SELECTIONS_TABLE)?;
    run_migration(conn, "004_generator_jobs", CREATE_GENERATOR_JOBS_TABLE)?;
    run_migration(conn, "005_generated_slips", CREATE_GENERATED_SLIPS_TABLES)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_MATCHES_TABLE: &str = r#"
CREATE TABLE matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    home_team TEXT NOT NULL,
    away_team TEXT NOT NULL,
    league TEXT,
    kickoff_at TEXT,
    home_form TEXT NOT NULL DEFAULT '[]',
    away_form TEXT NOT NULL DEFAULT '[]',
    head_to_head TEXT NOT NULL DEFAULT '[]',
    markets TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_MASTER_SLIPS_TABLE: &str = r#"
CREATE TABLE master_slips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stake REAL NOT NULL DEFAULT 10,
    currency TEXT NOT NULL DEFAULT 'EUR',
    status TEXT NOT NULL DEFAULT 'pending',
    engine_status TEXT NOT NULL DEFAULT 'idle',
    analysis_quality TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,
    total_odds REAL NOT NULL DEFAULT 0,
    estimated_payout REAL NOT NULL DEFAULT 0,
    alternative_slips_count INTEGER NOT NULL DEFAULT 0,
    best_alternative_slip_id INTEGER,
    processing_started_at TEXT,
    processing_completed_at TEXT,
    lock_version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_master_slips_status ON master_slips(status);
"#;

const CREATE_SLIP_SELECTIONS_TABLE: &str = r#"
CREATE TABLE slip_selections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slip_id INTEGER NOT NULL REFERENCES master_slips(id) ON DELETE CASCADE,
    match_id INTEGER NOT NULL REFERENCES matches(id),
    market TEXT NOT NULL,
    selection TEXT NOT NULL,
    odds REAL NOT NULL,
    analysis TEXT,
    position INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(slip_id, match_id)
);
CREATE INDEX IF NOT EXISTS idx_slip_selections_slip ON slip_selections(slip_id);
"#;

const CREATE_GENERATOR_JOBS_TABLE: &str = r#"
CREATE TABLE generator_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL UNIQUE,
    master_slip_id INTEGER NOT NULL REFERENCES master_slips(id) ON DELETE CASCADE,
    strategy TEXT NOT NULL DEFAULT 'monte_carlo',
    risk_profile TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'pending',
    progress INTEGER NOT NULL DEFAULT 0,
    total_slips INTEGER NOT NULL DEFAULT 0,
    generated_slips INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    started_at TEXT,
    completed_at TEXT,
    cancelled_at TEXT,
    cancelled_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_generator_jobs_slip ON generator_jobs(master_slip_id);
CREATE INDEX IF NOT EXISTS idx_generator_jobs_status ON generator_jobs(status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_generator_jobs_one_active
    ON generator_jobs(master_slip_id) WHERE status IN ('pending', 'running');
"#;

const CREATE_GENERATED_SLIPS_TABLES: &str = r#"
CREATE TABLE generated_slips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    master_slip_id INTEGER NOT NULL REFERENCES master_slips(id) ON DELETE CASCADE,
    job_id TEXT NOT NULL,
    stake REAL NOT NULL,
    total_odds REAL NOT NULL,
    possible_return REAL NOT NULL,
    risk_level TEXT NOT NULL DEFAULT 'medium',
    confidence_score REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_generated_slips_master ON generated_slips(master_slip_id);
CREATE INDEX IF NOT EXISTS idx_generated_slips_job ON generated_slips(job_id);

CREATE TABLE generated_slip_legs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    generated_slip_id INTEGER NOT NULL REFERENCES generated_slips(id) ON DELETE CASCADE,
    match_id INTEGER NOT NULL,
    market TEXT NOT NULL,
    selection TEXT NOT NULL,
    odds REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_generated_slip_legs_slip ON generated_slip_legs(generated_slip_id);
"#;
