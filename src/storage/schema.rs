//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Courtside database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Scraped player profiles
CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_name TEXT NOT NULL,
    player_image TEXT,
    position TEXT NOT NULL DEFAULT '',
    first_nba_season INTEGER,
    field_goal_made REAL,
    field_goal_attempted REAL,
    field_goal_pct REAL,
    three_pt_made REAL,
    three_pt_attempted REAL,
    three_pt_pct REAL,
    free_throw_made REAL,
    free_throw_attempted REAL,
    free_throw_pct REAL,
    true_stg_pct REAL,
    points REAL,
    off_reb REAL,
    def_reb REAL,
    tot_reb REAL,
    assists REAL,
    steals REAL,
    blocks REAL,
    turnovers REAL
);

CREATE INDEX IF NOT EXISTS idx_players_name ON players(player_name);

-- One row per crawl run
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    workers INTEGER,
    submitted INTEGER,
    persisted INTEGER,
    failures INTEGER,
    abandoned INTEGER,
    elapsed_ms INTEGER
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
