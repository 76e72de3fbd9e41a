use serde::Deserialize;

/// Main configuration structure for Courtside
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Worker pool and retry behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of listeners and pooled fetchers (defaults to available parallelism - 1)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Attempts per page before it is abandoned; 0 retries forever
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff applied before a failed page is requeued (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound on one fetch-and-parse call (seconds)
    #[serde(rename = "extraction-timeout-secs", default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// Records committed per transaction by the persistence task
    #[serde(rename = "commit-batch-size", default = "default_batch_size")]
    pub commit_batch_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            extraction_timeout_secs: default_extraction_timeout(),
            commit_batch_size: default_batch_size(),
        }
    }
}

impl CrawlerConfig {
    /// Resolved worker count: the configured value or one less than the
    /// available parallelism, never below one.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count).max(1)
    }
}

/// Which fetcher backs each pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherBackend {
    #[default]
    Http,
    Browser,
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(default)]
    pub backend: FetcherBackend,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for the HTTP backend (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            backend: FetcherBackend::default(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Primary store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Search index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Elasticsearch endpoint; indexing is disabled when absent
    #[serde(rename = "elasticsearch-url", default)]
    pub elasticsearch_url: Option<String>,

    /// Index name for player documents
    #[serde(default = "default_index")]
    pub index: String,

    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            elasticsearch_url: None,
            index: default_index(),
            per_page: default_per_page(),
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_extraction_timeout() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

fn default_user_agent() -> String {
    format!("courtside/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_database_path() -> String {
    "players.db".to_string()
}

fn default_index() -> String {
    "player".to_string()
}

fn default_per_page() -> usize {
    25
}
