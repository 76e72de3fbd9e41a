//! SQLite player store
//!
//! `PlayerStore` owns the connection. Writes go through a `Session`, which
//! wraps one SQLite transaction and records what it touched.

use crate::model::{Player, PlayerRecord, StatField};
use crate::output::CrawlReport;
use crate::storage::changes::ChangeSet;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::initialize_schema;
use crate::storage::{PlayerFilter, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

/// Columns of `players` after `id`, in the order rows are read and written
fn player_columns() -> String {
    let mut columns = vec!["player_name", "player_image", "position", "first_nba_season"];
    columns.extend(StatField::ALL.iter().map(|f| f.column()));
    columns.join(", ")
}

fn select_players(clause: &str) -> String {
    format!("SELECT id, {} FROM players {}", player_columns(), clause)
}

fn record_values(record: &PlayerRecord) -> Vec<SqlValue> {
    let mut values = vec![
        SqlValue::from(record.player_name.clone()),
        SqlValue::from(record.player_image.clone()),
        SqlValue::from(record.position.clone()),
        SqlValue::from(record.first_nba_season),
    ];
    values.extend(StatField::ALL.iter().map(|f| SqlValue::from(record.stats.get(*f))));
    values
}

fn row_to_player(row: &Row<'_>) -> rusqlite::Result<Player> {
    let mut record = PlayerRecord {
        player_name: row.get(1)?,
        player_image: row.get(2)?,
        position: row.get(3)?,
        first_nba_season: row.get(4)?,
        ..PlayerRecord::default()
    };
    for (offset, field) in StatField::ALL.iter().enumerate() {
        record.stats.set(*field, row.get(5 + offset)?);
    }
    Ok(Player {
        id: row.get(0)?,
        record,
    })
}

fn query_players(
    conn: &Connection,
    clause: &str,
    values: Vec<SqlValue>,
) -> StorageResult<Vec<Player>> {
    let mut stmt = conn.prepare(&select_players(clause))?;
    let players = stmt
        .query_map(params_from_iter(values), row_to_player)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(players)
}

fn get_player(conn: &Connection, id: i64) -> StorageResult<Option<Player>> {
    let player = conn
        .query_row(&select_players("WHERE id = ?1"), params![id], row_to_player)
        .optional()?;
    Ok(player)
}

fn find_player_by_name(conn: &Connection, name: &str) -> StorageResult<Option<Player>> {
    let player = conn
        .query_row(
            &select_players("WHERE player_name = ?1 ORDER BY id LIMIT 1"),
            params![name],
            row_to_player,
        )
        .optional()?;
    Ok(player)
}

/// SQLite storage backend for players and crawl runs
pub struct PlayerStore {
    conn: Connection,
}

impl PlayerStore {
    /// Opens (or creates) the database file and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Starts a transaction
    pub fn begin(&mut self) -> StorageResult<Session<'_>> {
        let tx = self.conn.transaction()?;
        Ok(Session {
            tx,
            changes: ChangeSet::new(),
        })
    }

    // ===== Queries =====

    pub fn get(&self, id: i64) -> StorageResult<Option<Player>> {
        get_player(&self.conn, id)
    }

    /// Loads the given ids; missing ids are skipped and no order is guaranteed
    pub fn get_many(&self, ids: &[i64]) -> StorageResult<Vec<Player>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let values = ids.iter().map(|id| SqlValue::from(*id)).collect();
        query_players(&self.conn, &format!("WHERE id IN ({})", placeholders), values)
    }

    pub fn all(&self) -> StorageResult<Vec<Player>> {
        query_players(&self.conn, "ORDER BY id", Vec::new())
    }

    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<Player>> {
        find_player_by_name(&self.conn, name)
    }

    pub fn find_where(&self, filter: &PlayerFilter) -> StorageResult<Vec<Player>> {
        let (clause, value) = match filter {
            PlayerFilter::NameContains(text) => (
                "WHERE player_name LIKE ?1 ORDER BY id",
                SqlValue::from(format!("%{}%", text)),
            ),
            PlayerFilter::Position(position) => (
                "WHERE position LIKE ?1 ORDER BY id",
                SqlValue::from(format!("%{}%", position)),
            ),
            PlayerFilter::DebutSeason(season) => (
                "WHERE first_nba_season = ?1 ORDER BY id",
                SqlValue::from(*season),
            ),
            PlayerFilter::MinPoints(points) => (
                "WHERE points >= ?1 ORDER BY points DESC, id",
                SqlValue::from(*points),
            ),
        };
        query_players(&self.conn, clause, vec![value])
    }

    pub fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    /// Records the start of a crawl run and returns its id
    pub fn create_run(&mut self, kind: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (kind, config_hash, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![kind, config_hash, now, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Stores the final status and counters of a run
    pub fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        report: Option<&CrawlReport>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2, workers = ?3, submitted = ?4,
             persisted = ?5, failures = ?6, abandoned = ?7, elapsed_ms = ?8 WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                report.map(|r| r.workers as i64),
                report.map(|r| r.submitted as i64),
                report.map(|r| r.persisted as i64),
                report.map(|r| r.failures as i64),
                report.map(|r| r.abandoned as i64),
                report.map(|r| r.elapsed.as_millis() as i64),
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, kind, config_hash, started_at, finished_at, status, persisted, elapsed_ms
                 FROM crawl_runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        config_hash: row.get(2)?,
                        started_at: row.get(3)?,
                        finished_at: row.get(4)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                            .unwrap_or(RunStatus::Aborted),
                        persisted: row.get::<_, Option<i64>>(6)?.map(|n| n as u64),
                        elapsed_ms: row.get::<_, Option<i64>>(7)?.map(|n| n as u64),
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Vetoes every commit from now on, turning it into a rollback
    #[cfg(test)]
    pub(crate) fn veto_commits(&mut self) {
        self.conn.commit_hook(Some(|| true));
    }
}

/// One open transaction on the player store
///
/// Every write is recorded in the session's [`ChangeSet`]. Dropping a session
/// without committing rolls the transaction back.
pub struct Session<'a> {
    tx: Transaction<'a>,
    changes: ChangeSet<Player>,
}

impl<'a> Session<'a> {
    /// Inserts a new player and returns the stored row
    pub fn add(&mut self, record: PlayerRecord) -> StorageResult<Player> {
        let values = record_values(&record);
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        self.tx.execute(
            &format!(
                "INSERT INTO players ({}) VALUES ({})",
                player_columns(),
                placeholders
            ),
            params_from_iter(values),
        )?;

        let player = Player {
            id: self.tx.last_insert_rowid(),
            record,
        };
        self.changes.record_added(player.id, player.clone());
        Ok(player)
    }

    /// Replaces every column of an existing player
    pub fn update(&mut self, player: &Player) -> StorageResult<()> {
        let mut values = record_values(&player.record);
        let assignments = player_columns()
            .split(", ")
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = values.len() + 1;
        values.push(SqlValue::from(player.id));

        let updated = self.tx.execute(
            &format!("UPDATE players SET {} WHERE id = ?{}", assignments, id_param),
            params_from_iter(values),
        )?;
        if updated == 0 {
            return Err(StorageError::PlayerNotFound(player.id));
        }

        self.changes.record_modified(player.id, player.clone());
        Ok(())
    }

    /// Deletes a player and returns the row as it was
    pub fn delete(&mut self, id: i64) -> StorageResult<Player> {
        let player = get_player(&self.tx, id)?.ok_or(StorageError::PlayerNotFound(id))?;
        self.tx
            .execute("DELETE FROM players WHERE id = ?1", params![id])?;
        self.changes.record_removed(id, player.clone());
        Ok(player)
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<Player>> {
        get_player(&self.tx, id)
    }

    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<Player>> {
        find_player_by_name(&self.tx, name)
    }

    /// Changes made so far in this transaction
    pub fn pending(&self) -> &ChangeSet<Player> {
        &self.changes
    }

    /// Commits and hands back what the transaction changed
    pub fn commit(self) -> StorageResult<ChangeSet<Player>> {
        self.tx.commit()?;
        Ok(self.changes)
    }

    pub fn rollback(self) -> StorageResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
