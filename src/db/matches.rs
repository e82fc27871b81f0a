//! Match record storage
//!
//! Raw form sequences, head-to-head history and market lists are stored as
//! JSON columns; everything derived from them is recomputed on read by the
//! stats modules, never persisted.

use rusqlite::Connection;

use crate::db::models::{MatchRecord, NewMatchRecord};
use crate::db::{json_col, json_param};
use crate::error::{AppError, Result};

const MATCH_COLUMNS: &str = "id, home_team, away_team, league, kickoff_at,
         home_form, away_form, head_to_head, markets, created_at, updated_at";

fn map_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        league: row.get(3)?,
        kickoff_at: row.get(4)?,
        home_form: json_col(row, 5)?,
        away_form: json_col(row, 6)?,
        head_to_head: json_col(row, 7)?,
        markets: json_col(row, 8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a match record with its raw statistical context
pub fn create_match(conn: &Connection, new: &NewMatchRecord) -> Result<MatchRecord> {
    conn.execute(
        "INSERT INTO matches (home_team, away_team, league, kickoff_at,
                              home_form, away_form, head_to_head, markets)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            new.home_team,
            new.away_team,
            new.league,
            new.kickoff_at,
            json_param(&new.home_form)?,
            json_param(&new.away_form)?,
            json_param(&new.head_to_head)?,
            json_param(&new.markets)?,
        ],
    )?;

    get_match(conn, conn.last_insert_rowid())
}

/// Get a match by ID
pub fn get_match(conn: &Connection, id: i64) -> Result<MatchRecord> {
    conn.query_row(
        &format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS),
        [id],
        map_match,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Match not found: {}", id))
        }
        _ => e.into(),
    })
}

/// List all matches, newest first
pub fn list_matches(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM matches ORDER BY created_at DESC, id DESC",
        MATCH_COLUMNS
    ))?;

    let matches = stmt
        .query_map([], map_match)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(matches)
}

/// Fetch a set of matches by ID. Returns whatever exists; callers decide
/// whether missing IDs are an error.
pub fn get_matches_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<MatchRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM matches WHERE id IN ({})",
        MATCH_COLUMNS, placeholders
    );

    let params: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
    let mut stmt = conn.prepare(&sql)?;
    let matches = stmt
        .query_map(params.as_slice(), map_match)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(matches)
}
