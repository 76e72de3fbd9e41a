//! Crawler module for player page scraping
//!
//! This module contains the core crawling logic, including:
//! - The shared work queue and its stop sentinel
//! - The fixed-size fetcher pool (HTTP or headless browser)
//! - Player page extraction
//! - Listener coordination, retries and batched persistence

mod coordinator;
mod extractor;
mod fetcher;
mod pool;
mod queue;

pub use coordinator::{CrawlCoordinator, CrawlSettings, Stage};
pub use extractor::{extract, ExtractError, ExtractionResult, Extractor, ImageExtractor, PlayerExtractor};
#[cfg(feature = "browser")]
pub use fetcher::{BrowserFetcher, BrowserFetcherFactory};
pub use fetcher::{build_http_client, FetchError, FetcherFactory, HttpFetcher, HttpFetcherFactory, PageFetcher};
pub use pool::{Lease, ResourcePool};
pub use queue::{BlockingQueue, Descriptor, WorkItem, WorkQueue};

pub use crate::output::CrawlReport;

use crate::config::{Config, FetcherBackend};
use crate::search::SearchIndex;
use crate::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// What a crawl extracts and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlKind {
    /// Full player records, inserted as new rows
    Players,
    /// Headshot file names, set on existing rows matched by name
    Images,
}

impl CrawlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Players => "players",
            Self::Images => "images",
        }
    }
}

/// Parses a URL list: one URL per line, blank lines and `#` comments ignored
///
/// Invalid URLs are skipped with a warning and duplicates keep their first
/// position.
pub fn parse_url_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| match Url::parse(line) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(line, error = %e, "Skipping invalid URL");
                false
            }
        })
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

/// Reads a URL list file
pub fn read_url_file(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&content))
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the player store and its search index
/// 2. Build the fetcher factory for the configured backend
/// 3. Crawl every URL with the extractor matching `kind`
/// 4. Record the run in `crawl_runs`
///
/// # Arguments
///
/// * `config` - The loaded configuration
/// * `config_hash` - Hash of the config file, stored with the run
/// * `urls` - Pages to crawl
/// * `kind` - What to extract from each page
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    urls: Vec<String>,
    kind: CrawlKind,
) -> Result<CrawlReport> {
    let store = Arc::new(crate::search::open_store(config)?);
    let coordinator = CrawlCoordinator::new(store, CrawlSettings::from_config(&config.crawler))
        .with_run_record(kind.as_str(), config_hash);

    match config.fetcher.backend {
        FetcherBackend::Http => {
            let factory = HttpFetcherFactory::from_config(&config.fetcher)?;
            dispatch(&coordinator, urls, &factory, kind).await
        }
        #[cfg(feature = "browser")]
        FetcherBackend::Browser => {
            let timeout = std::time::Duration::from_secs(config.fetcher.request_timeout_secs);
            let factory = BrowserFetcherFactory::new(timeout);
            dispatch(&coordinator, urls, &factory, kind).await
        }
        #[cfg(not(feature = "browser"))]
        FetcherBackend::Browser => Err(crate::ConfigError::Validation(
            "fetcher backend \"browser\" requires the `browser` feature".to_string(),
        )
        .into()),
    }
}

async fn dispatch<I, Fa>(
    coordinator: &CrawlCoordinator<I>,
    urls: Vec<String>,
    factory: &Fa,
    kind: CrawlKind,
) -> Result<CrawlReport>
where
    I: SearchIndex + 'static,
    Fa: FetcherFactory,
{
    match kind {
        CrawlKind::Players => coordinator.run(urls, factory, PlayerExtractor).await,
        CrawlKind::Images => coordinator.run(urls, factory, ImageExtractor).await,
    }
}
