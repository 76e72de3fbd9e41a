//! Storage module for persisting players
//!
//! This module is the primary datastore:
//! - SQLite database initialization and schema management
//! - Player rows, written through transactional sessions
//! - Per-transaction change tracking for the search index hook
//! - Crawl run tracking

mod changes;
mod error;
mod schema;
mod sqlite;

pub use changes::ChangeSet;
pub use error::{StorageError, StorageResult};
pub use sqlite::{PlayerStore, Session};

use std::path::Path;

/// Opens or creates the player database
pub fn open_storage(path: &Path) -> StorageResult<PlayerStore> {
    PlayerStore::new(path)
}

/// Predicates understood by [`PlayerStore::find_where`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerFilter {
    /// Substring match on the player name
    NameContains(String),
    /// Substring match on the position list
    Position(String),
    DebutSeason(i32),
    /// Career points per game at or above the value, best scorers first
    MinPoints(f64),
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: String,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub persisted: Option<u64>,
    pub elapsed_ms: Option<u64>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}
