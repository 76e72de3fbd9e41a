//! Search index module
//!
//! The search index is a secondary store kept in step with the player
//! database. This module provides:
//! - The [`SearchIndex`] trait and its Elasticsearch and in-memory backends
//! - The [`Searchable`] capability entities implement to be indexed
//! - [`IndexSync`], which mirrors committed changes into the index
//! - [`SyncedStore`], the store wrapper that runs every transaction through
//!   the hook and serves relevance-ordered searches

mod document;
mod elastic;
mod memory;
mod sync;

pub use document::{IndexDocument, Searchable};
pub use elastic::ElasticsearchIndex;
pub use memory::MemoryIndex;
pub use sync::{order_by_rank, IndexSync, SearchResults, SyncOutcome, SyncedStore};

use crate::config::Config;
use crate::storage::open_storage;
use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// Errors reported by a search backend
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search response: {0}")]
    MalformedResponse(String),

    #[error("Invalid search endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Search backend unavailable: {0}")]
    Unavailable(String),
}

/// Ids of matching documents in relevance order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub ids: Vec<i64>,

    /// Total matches, not just the returned page
    pub total: u64,

    /// Backend response, kept for callers that need more than ids
    pub raw: serde_json::Value,
}

/// A full-text store keyed by entity id
pub trait SearchIndex: Send + Sync {
    /// False when the backend is unconfigured; every operation is then a no-op
    fn is_enabled(&self) -> bool {
        true
    }

    /// Inserts or fully replaces the document stored under `document.id`
    fn upsert(
        &self,
        index: &str,
        document: &IndexDocument,
    ) -> impl Future<Output = Result<(), SearchError>> + Send;

    /// Removes a document; removing an absent id is not an error
    fn delete(&self, index: &str, id: i64) -> impl Future<Output = Result<(), SearchError>> + Send;

    /// Runs a query across every indexed field
    fn search(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<SearchHits, SearchError>> + Send;
}

/// Opens the configured player store wrapped with its search index
pub fn open_store(config: &Config) -> crate::Result<SyncedStore<ElasticsearchIndex>> {
    let store = open_storage(Path::new(&config.storage.database_path))?;
    let index = ElasticsearchIndex::from_config(&config.search)?;
    if !index.is_enabled() {
        tracing::info!("No Elasticsearch endpoint configured, search indexing disabled");
    }
    Ok(SyncedStore::new(store, index, config.search.index.clone()))
}
