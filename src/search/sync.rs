//! Write-after-commit index synchronisation

use crate::model::Player;
use crate::search::{IndexDocument, SearchHits, SearchIndex, Searchable};
use crate::storage::{ChangeSet, PlayerStore, Session, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// What a post-commit sync did to the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub upserted: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Mirrors committed changes of searchable entities into a search index
///
/// The hook runs in two halves around a commit. [`IndexSync::before_commit`]
/// snapshots the documents while the transaction is still open and
/// [`IndexSync::after_commit`] applies the snapshot once the commit has
/// succeeded. Index failures are logged and never reach the caller.
pub struct IndexSync<I> {
    index: I,
    name: String,
}

impl<I: SearchIndex> IndexSync<I> {
    pub fn new(index: I, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn index_name(&self) -> &str {
        &self.name
    }

    /// Captures the index documents of every pending change
    pub fn before_commit<T: Searchable>(&self, pending: &ChangeSet<T>) -> ChangeSet<IndexDocument> {
        let mut snapshot = ChangeSet::new();
        for entity in pending.added() {
            snapshot.record_added(entity.search_id(), entity.index_document());
        }
        for entity in pending.modified() {
            snapshot.record_modified(entity.search_id(), entity.index_document());
        }
        for entity in pending.removed() {
            snapshot.record_removed(entity.search_id(), entity.index_document());
        }
        snapshot
    }

    /// Applies a committed snapshot: upserts first, then deletions
    pub async fn after_commit(&self, snapshot: ChangeSet<IndexDocument>) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        if snapshot.is_empty() {
            return outcome;
        }
        if !self.index.is_enabled() {
            tracing::debug!(changes = snapshot.len(), "Search index disabled, skipping sync");
            return outcome;
        }

        let (upserts, removals) = snapshot.into_parts();

        for (id, document) in upserts {
            match self.index.upsert(&self.name, &document).await {
                Ok(()) => outcome.upserted += 1,
                Err(e) => {
                    tracing::warn!(index = %self.name, id, error = %e, "Failed to index document");
                    outcome.failed += 1;
                }
            }
        }

        for (id, _) in removals {
            match self.index.delete(&self.name, id).await {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    tracing::warn!(index = %self.name, id, error = %e, "Failed to remove document from index");
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            index = %self.name,
            upserted = outcome.upserted,
            deleted = outcome.deleted,
            failed = outcome.failed,
            "Search index synced"
        );
        outcome
    }
}

/// One page of search results, rehydrated from the store
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<T> {
    /// Stored entities in relevance order
    pub items: Vec<T>,

    /// Ids as returned by the index, including any that no longer exist
    pub ids: Vec<i64>,

    pub total: u64,

    pub raw: serde_json::Value,
}

impl<T> SearchResults<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            ids: Vec::new(),
            total: 0,
            raw: serde_json::Value::Null,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reorders `items` to follow `ids`, dropping items the index did not return
pub fn order_by_rank<T: Searchable>(ids: &[i64], items: Vec<T>) -> Vec<T> {
    let rank: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut ranked: Vec<(usize, T)> = items
        .into_iter()
        .filter_map(|item| rank.get(&item.search_id()).map(|r| (*r, item)))
        .collect();
    ranked.sort_by_key(|(r, _)| *r);
    ranked.into_iter().map(|(_, item)| item).collect()
}

/// Player store whose transactions are mirrored into a search index
///
/// Commits reach the index in commit order: a transaction holds the sync
/// lock from before it begins until its index sync has finished.
pub struct SyncedStore<I> {
    store: Mutex<PlayerStore>,
    sync: IndexSync<I>,
    sync_order: tokio::sync::Mutex<()>,
}

impl<I: SearchIndex> SyncedStore<I> {
    pub fn new(store: PlayerStore, index: I, index_name: impl Into<String>) -> Self {
        Self {
            store: Mutex::new(store),
            sync: IndexSync::new(index, index_name),
            sync_order: tokio::sync::Mutex::new(()),
        }
    }

    pub fn index(&self) -> &I {
        self.sync.index()
    }

    pub fn index_name(&self) -> &str {
        self.sync.index_name()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, PlayerStore>> {
        self.store.lock().map_err(|_| StorageError::Poisoned)
    }

    fn commit_locked<R, F>(&self, f: F) -> StorageResult<(R, ChangeSet<IndexDocument>)>
    where
        F: FnOnce(&mut Session<'_>) -> StorageResult<R>,
    {
        let mut store = self.lock()?;
        let mut session = store.begin()?;
        let value = f(&mut session)?;
        let snapshot = self.sync.before_commit(session.pending());
        session.commit()?;
        Ok((value, snapshot))
    }

    /// Runs `f` inside one transaction and syncs the index after it commits
    ///
    /// An error from `f` or from the commit rolls everything back and leaves
    /// the index untouched.
    pub async fn transaction<R, F>(&self, f: F) -> StorageResult<(R, SyncOutcome)>
    where
        F: FnOnce(&mut Session<'_>) -> StorageResult<R>,
    {
        let _order = self.sync_order.lock().await;
        let (value, snapshot) = self.commit_locked(f)?;
        let outcome = self.sync.after_commit(snapshot).await;
        Ok((value, outcome))
    }

    /// Direct store access for bookkeeping that is not indexed
    pub fn with_store<R>(&self, f: impl FnOnce(&mut PlayerStore) -> StorageResult<R>) -> StorageResult<R> {
        let mut store = self.lock()?;
        f(&mut store)
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<Player>> {
        self.with_store(|store| store.get(id))
    }

    pub fn all(&self) -> StorageResult<Vec<Player>> {
        self.with_store(|store| store.all())
    }

    pub fn count(&self) -> StorageResult<u64> {
        self.with_store(|store| store.count())
    }

    /// Full-text search; `page` starts at 1
    pub async fn search(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
    ) -> StorageResult<SearchResults<Player>> {
        if !self.sync.index().is_enabled() {
            return Ok(SearchResults::empty());
        }

        let offset = (page.max(1) - 1).saturating_mul(per_page);
        let hits = match self
            .sync
            .index()
            .search(self.sync.index_name(), query, offset, per_page)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query, error = %e, "Search index query failed");
                SearchHits::default()
            }
        };

        if hits.ids.is_empty() {
            return Ok(SearchResults {
                total: hits.total,
                raw: hits.raw,
                ..SearchResults::empty()
            });
        }

        let rows = self.with_store(|store| store.get_many(&hits.ids))?;
        if rows.len() < hits.ids.len() {
            tracing::debug!(
                hits = hits.ids.len(),
                found = rows.len(),
                "Search index returned ids missing from the store"
            );
        }

        Ok(SearchResults {
            items: order_by_rank(&hits.ids, rows),
            ids: hits.ids,
            total: hits.total,
            raw: hits.raw,
        })
    }

    /// Upserts every stored player; returns how many were indexed
    pub async fn reindex(&self) -> StorageResult<usize> {
        if !self.sync.index().is_enabled() {
            tracing::warn!("Search index disabled, nothing to reindex");
            return Ok(0);
        }

        let _order = self.sync_order.lock().await;
        let players = self.all()?;
        let mut indexed = 0;
        for player in &players {
            match self
                .sync
                .index()
                .upsert(self.sync.index_name(), &player.index_document())
                .await
            {
                Ok(()) => indexed += 1,
                Err(e) => tracing::warn!(id = player.id, error = %e, "Failed to reindex player"),
            }
        }

        tracing::info!(indexed, total = players.len(), "Reindex complete");
        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlayerRecord;
    use crate::search::{MemoryIndex, SearchError};
    use std::sync::Arc;
    use std::time::Duration;

    fn store_with(index: MemoryIndex) -> SyncedStore<MemoryIndex> {
        SyncedStore::new(PlayerStore::new_in_memory().unwrap(), index, "player")
    }

    fn record(name: &str, position: &str) -> PlayerRecord {
        let mut record = PlayerRecord::named(name);
        record.position = position.to_string();
        record
    }

    /// Returns a fixed id list regardless of the query
    struct FixedHits(Vec<i64>);

    impl SearchIndex for FixedHits {
        async fn upsert(&self, _index: &str, _document: &IndexDocument) -> Result<(), SearchError> {
            Ok(())
        }

        async fn delete(&self, _index: &str, _id: i64) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search(
            &self,
            _index: &str,
            _query: &str,
            _offset: usize,
            _limit: usize,
        ) -> Result<SearchHits, SearchError> {
            Ok(SearchHits {
                ids: self.0.clone(),
                total: self.0.len() as u64,
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn test_committed_changes_reach_index() {
        let index = MemoryIndex::new();
        let store = store_with(index.clone());

        let (player, outcome) = store
            .transaction(|session| session.add(record("Steve Nash", "PG")))
            .await
            .unwrap();
        assert_eq!(outcome.upserted, 1);
        assert!(index.contains("player", player.id));

        let (_, outcome) = store
            .transaction(|session| session.delete(player.id))
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 1);
        assert!(!index.contains("player", player.id));
    }

    #[tokio::test]
    async fn test_update_replaces_document() {
        let index = MemoryIndex::new();
        let store = store_with(index.clone());

        let (mut player, _) = store
            .transaction(|session| session.add(record("Dirk Nowitzki", "PF")))
            .await
            .unwrap();

        player.record.position = "PF, C".to_string();
        let (_, outcome) = store
            .transaction(|session| session.update(&player))
            .await
            .unwrap();
        assert_eq!(outcome.upserted, 1);

        let document = index.document("player", player.id).unwrap();
        assert_eq!(document.fields["position"], serde_json::json!("PF, C"));
    }

    #[tokio::test]
    async fn test_add_then_delete_in_one_transaction_leaves_index_empty() {
        let index = MemoryIndex::new();
        let store = store_with(index.clone());

        let (_, outcome) = store
            .transaction(|session| {
                let player = session.add(record("Ephemeral", "C"))?;
                session.delete(player.id)
            })
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::default());
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_body_touches_nothing() {
        let index = MemoryIndex::new();
        let store = store_with(index.clone());

        let result = store
            .transaction(|session| {
                session.add(record("Rolled Back", "SF"))?;
                session.delete(12345)
            })
            .await;

        assert!(matches!(result, Err(StorageError::PlayerNotFound(12345))));
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_touches_nothing() {
        let index = MemoryIndex::new();
        let mut inner = PlayerStore::new_in_memory().unwrap();
        inner.veto_commits();
        let store = SyncedStore::new(inner, index.clone(), "player");

        let result = store
            .transaction(|session| session.add(record("Never Committed", "SG")))
            .await;

        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_index_does_not_fail_commit() {
        let index = MemoryIndex::failing();
        let store = store_with(index.clone());

        let (player, outcome) = store
            .transaction(|session| session.add(record("Still Saved", "C")))
            .await
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.upserted, 0);
        assert!(store.get(player.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_follows_index_order() {
        let store = SyncedStore::new(
            PlayerStore::new_in_memory().unwrap(),
            FixedHits(vec![3, 1, 2]),
            "player",
        );
        for name in ["One", "Two", "Three"] {
            store
                .transaction(|session| session.add(record(name, "G")))
                .await
                .unwrap();
        }

        let results = store.search("anything", 1, 10).await.unwrap();
        let ids: Vec<i64> = results.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(results.total, 3);
    }

    #[tokio::test]
    async fn test_search_skips_stale_ids() {
        let store = SyncedStore::new(
            PlayerStore::new_in_memory().unwrap(),
            FixedHits(vec![42, 1]),
            "player",
        );
        store
            .transaction(|session| session.add(record("Only", "G")))
            .await
            .unwrap();

        let results = store.search("only", 1, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.ids, vec![42, 1]);
    }

    #[tokio::test]
    async fn test_zero_hits() {
        let index = MemoryIndex::new();
        let store = store_with(index);
        store
            .transaction(|session| session.add(record("Kevin Garnett", "PF")))
            .await
            .unwrap();

        let results = store.search("zzzz", 1, 25).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(results.total, 0);
    }

    #[tokio::test]
    async fn test_search_pages_are_one_based() {
        let index = MemoryIndex::new();
        let store = store_with(index);
        for i in 0..5 {
            store
                .transaction(|session| session.add(record(&format!("Center {}", i), "C")))
                .await
                .unwrap();
        }

        let first = store.search("center", 1, 2).await.unwrap();
        let third = store.search("center", 3, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(third.len(), 1);
        assert_eq!(third.total, 5);
    }

    #[tokio::test]
    async fn test_reindex_restores_documents() {
        let index = MemoryIndex::failing();
        let store = store_with(index.clone());
        for name in ["Tony Parker", "Manu Ginobili"] {
            store
                .transaction(|session| session.add(record(name, "G")))
                .await
                .unwrap();
        }
        assert!(index.is_empty("player"));

        index.set_failing(false);
        assert_eq!(store.reindex().await.unwrap(), 2);
        assert_eq!(index.len("player"), 2);
    }

    /// Memory index that stalls upserts of documents at one position
    #[derive(Clone)]
    struct SlowPosition {
        inner: MemoryIndex,
        position: &'static str,
        delay: Duration,
    }

    impl SearchIndex for SlowPosition {
        async fn upsert(&self, index: &str, document: &IndexDocument) -> Result<(), SearchError> {
            if document.fields["position"] == serde_json::json!(self.position) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.upsert(index, document).await
        }

        async fn delete(&self, index: &str, id: i64) -> Result<(), SearchError> {
            self.inner.delete(index, id).await
        }

        async fn search(
            &self,
            index: &str,
            query: &str,
            offset: usize,
            limit: usize,
        ) -> Result<SearchHits, SearchError> {
            self.inner.search(index, query, offset, limit).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_updates_sync_in_commit_order() {
        let inner = MemoryIndex::new();
        let index = SlowPosition {
            inner: inner.clone(),
            position: "OLD",
            delay: Duration::from_millis(200),
        };
        let store = Arc::new(SyncedStore::new(
            PlayerStore::new_in_memory().unwrap(),
            index,
            "player",
        ));
        let (player, _) = store
            .transaction(|session| session.add(record("Vince Carter", "SG")))
            .await
            .unwrap();

        let first = {
            let store = store.clone();
            let mut player = player.clone();
            tokio::spawn(async move {
                player.record.position = "OLD".to_string();
                store.transaction(|session| session.update(&player)).await.unwrap();
            })
        };
        let second = {
            let store = store.clone();
            let mut player = player.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                player.record.position = "NEW".to_string();
                store.transaction(|session| session.update(&player)).await.unwrap();
            })
        };
        first.await.unwrap();
        second.await.unwrap();

        let stored = store.get(player.id).unwrap().unwrap();
        let document = inner.document("player", player.id).unwrap();
        assert_eq!(stored.record.position, "NEW");
        assert_eq!(document.fields["position"], serde_json::json!(stored.record.position));
    }

    #[tokio::test]
    async fn test_huge_page_does_not_overflow() {
        let index = MemoryIndex::new();
        let store = store_with(index);
        store
            .transaction(|session| session.add(record("Allen Iverson", "PG")))
            .await
            .unwrap();

        let results = store.search("iverson", usize::MAX, 25).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_order_by_rank_drops_unranked() {
        let players: Vec<Player> = (1..=4)
            .map(|id| Player {
                id,
                record: PlayerRecord::named(format!("P{}", id)),
            })
            .collect();

        let ordered = order_by_rank(&[4, 2], players);
        let ids: Vec<i64> = ordered.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 2]);
    }
}
