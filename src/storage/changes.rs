//! Per-transaction change tracking

use std::collections::BTreeMap;

/// Entities touched by one transaction, keyed by id
///
/// An id appears in at most one of the three sets. The set is owned by its
/// transaction and handed out by value on commit, so it cannot outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    added: BTreeMap<i64, T>,
    modified: BTreeMap<i64, T>,
    removed: BTreeMap<i64, T>,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            added: BTreeMap::new(),
            modified: BTreeMap::new(),
            removed: BTreeMap::new(),
        }
    }
}

impl<T> ChangeSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_added(&mut self, id: i64, entity: T) {
        self.added.insert(id, entity);
    }

    /// Records a modification; an entity added in the same transaction stays "added"
    pub fn record_modified(&mut self, id: i64, entity: T) {
        if let Some(slot) = self.added.get_mut(&id) {
            *slot = entity;
        } else {
            self.modified.insert(id, entity);
        }
    }

    /// Records a removal; an entity added in the same transaction simply disappears
    pub fn record_removed(&mut self, id: i64, entity: T) {
        if self.added.remove(&id).is_some() {
            return;
        }
        self.modified.remove(&id);
        self.removed.insert(id, entity);
    }

    pub fn added(&self) -> impl Iterator<Item = &T> {
        self.added.values()
    }

    pub fn modified(&self) -> impl Iterator<Item = &T> {
        self.modified.values()
    }

    pub fn removed(&self) -> impl Iterator<Item = &T> {
        self.removed.values()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Splits into (upserts, removals); upserts list added entities before modified ones
    pub fn into_parts(self) -> (Vec<(i64, T)>, Vec<(i64, T)>) {
        let upserts = self.added.into_iter().chain(self.modified).collect();
        let removals = self.removed.into_iter().collect();
        (upserts, removals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_after_add_stays_added() {
        let mut changes = ChangeSet::new();
        changes.record_added(1, "a");
        changes.record_modified(1, "b");

        assert_eq!(changes.added().collect::<Vec<_>>(), vec![&"b"]);
        assert_eq!(changes.modified().count(), 0);
    }

    #[test]
    fn test_remove_after_add_cancels_out() {
        let mut changes = ChangeSet::new();
        changes.record_added(1, "a");
        changes.record_removed(1, "a");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_remove_after_modify_is_only_removed() {
        let mut changes = ChangeSet::new();
        changes.record_modified(4, "old");
        changes.record_removed(4, "old");

        assert_eq!(changes.modified().count(), 0);
        let (upserts, removals) = changes.into_parts();
        assert!(upserts.is_empty());
        assert_eq!(removals, vec![(4, "old")]);
    }

    #[test]
    fn test_into_parts_lists_added_first() {
        let mut changes = ChangeSet::new();
        changes.record_added(2, 20);
        changes.record_modified(1, 10);
        changes.record_removed(3, 30);

        let (upserts, removals) = changes.into_parts();

        assert_eq!(upserts, vec![(2, 20), (1, 10)]);
        assert_eq!(removals, vec![(3, 30)]);
    }
}
