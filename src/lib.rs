//! Courtside: a player statistics crawler
//!
//! This crate scrapes basketball player pages with a fixed pool of fetchers,
//! persists the extracted records in SQLite, and mirrors every committed
//! change into a full-text search index.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod search;
pub mod storage;

use thiserror::Error;

/// Main error type for Courtside operations
#[derive(Debug, Error)]
pub enum CourtsideError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialise fetcher pool: {0}")]
    ResourceInit(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Search index error: {0}")]
    Search(#[from] search::SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence task failed: {0}")]
    Persistence(String),

    #[error("Crawl listener panicked: {0}")]
    WorkerPanicked(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Courtside operations
pub type Result<T> = std::result::Result<T, CourtsideError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlCoordinator, CrawlReport};
pub use model::{Player, PlayerRecord};
pub use search::{ElasticsearchIndex, SearchIndex, SearchResults, SyncedStore};
pub use storage::PlayerStore;
