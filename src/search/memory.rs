//! In-process search index
//!
//! Scores documents by how often the query terms occur in their string
//! fields. A test double for [`ElasticsearchIndex`](crate::search::ElasticsearchIndex)
//! with an injectable outage.

use crate::search::{IndexDocument, SearchError, SearchHits, SearchIndex};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Documents = HashMap<String, BTreeMap<i64, IndexDocument>>;

/// A cloneable handle to a shared in-memory index
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    documents: Arc<Mutex<Documents>>,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index whose every call fails as if the backend were down
    pub fn failing() -> Self {
        let index = Self::default();
        index.set_failing(true);
        index
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of upsert, delete and search calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, index: &str, id: i64) -> bool {
        self.with_documents(|docs| docs.get(index).is_some_and(|d| d.contains_key(&id)))
    }

    pub fn len(&self, index: &str) -> usize {
        self.with_documents(|docs| docs.get(index).map_or(0, BTreeMap::len))
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    pub fn document(&self, index: &str, id: i64) -> Option<IndexDocument> {
        self.with_documents(|docs| docs.get(index).and_then(|d| d.get(&id).cloned()))
    }

    fn with_documents<R>(&self, f: impl FnOnce(&mut Documents) -> R) -> R {
        let mut docs = self
            .documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut docs)
    }

    fn enter(&self) -> Result<(), SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SearchError::Unavailable("memory index set to fail".to_string()));
        }
        Ok(())
    }
}

/// Occurrences of each query term in the document text
fn score(document: &IndexDocument, terms: &[String]) -> usize {
    let text = document.text();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    terms
        .iter()
        .map(|term| words.iter().filter(|w| **w == term.as_str()).count())
        .sum()
}

impl SearchIndex for MemoryIndex {
    async fn upsert(&self, index: &str, document: &IndexDocument) -> Result<(), SearchError> {
        self.enter()?;
        self.with_documents(|docs| {
            docs.entry(index.to_string())
                .or_default()
                .insert(document.id, document.clone());
        });
        Ok(())
    }

    async fn delete(&self, index: &str, id: i64) -> Result<(), SearchError> {
        self.enter()?;
        self.with_documents(|docs| {
            if let Some(d) = docs.get_mut(index) {
                d.remove(&id);
            }
        });
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchHits, SearchError> {
        self.enter()?;

        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut scored: Vec<(i64, usize)> = self.with_documents(|docs| {
            docs.get(index)
                .map(|d| {
                    d.values()
                        .map(|doc| (doc.id, score(doc, &terms)))
                        .filter(|(_, s)| *s > 0)
                        .collect()
                })
                .unwrap_or_default()
        });
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let total = scored.len() as u64;
        let page: Vec<(i64, usize)> = scored.into_iter().skip(offset).take(limit).collect();

        let raw = json!({
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": page
                    .iter()
                    .map(|(id, s)| json!({ "_id": id.to_string(), "_score": *s as f64 }))
                    .collect::<Vec<Value>>(),
            }
        });

        Ok(SearchHits {
            ids: page.into_iter().map(|(id, _)| id).collect(),
            total,
            raw,
        })
    }
}
