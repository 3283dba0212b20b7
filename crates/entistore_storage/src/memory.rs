//! In-memory storage adapter for testing.

use crate::adapter::{
    ChangeBuffer, ChangeKind, CommitLock, EntityScan, MapChanges, StorageAdapter,
};
use crate::error::{StorageError, StorageResult};
use crate::reference::EntityReference;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory storage adapter.
///
/// This adapter keeps every entity in a map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This adapter is thread-safe and can be shared across threads. A change
/// set is validated and applied under one write lock.
///
/// # Example
///
/// ```rust
/// use entistore_storage::{ChangeBuffer, EntityReference, MemoryMapStore, StorageAdapter};
///
/// let store = MemoryMapStore::new();
/// let mut changes = ChangeBuffer::new();
/// changes.new_entity(EntityReference::new("a"), "Thing", b"state".to_vec());
/// store.apply_changes(&changes).unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryMapStore {
    entries: Arc<RwLock<BTreeMap<EntityReference, Vec<u8>>>>,
    commit_lock: CommitLock,
}

impl MemoryMapStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    ///
    /// Useful for testing decoding of older envelopes.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (EntityReference, Vec<u8>)>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().collect())),
            commit_lock: CommitLock::default(),
        }
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StorageAdapter for MemoryMapStore {
    fn get(&self, reference: &EntityReference) -> StorageResult<Vec<u8>> {
        self.entries
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::not_found(reference))
    }

    fn contains(&self, reference: &EntityReference) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(reference))
    }

    fn apply_changes(&self, changes: &dyn MapChanges) -> StorageResult<()> {
        let staged = ChangeBuffer::collect(changes)?;
        let mut entries = self.entries.write();

        // Nothing is touched until the whole set is known to apply
        staged.validate(|reference| Ok(entries.contains_key(reference)))?;

        for change in staged.into_changes() {
            match change.kind {
                ChangeKind::New | ChangeKind::Update => {
                    entries.insert(change.reference, change.data);
                }
                ChangeKind::Remove => {
                    entries.remove(&change.reference);
                }
            }
        }
        Ok(())
    }

    fn commit_lock(&self) -> CommitLock {
        Arc::clone(&self.commit_lock)
    }

    fn scan_all(&self) -> StorageResult<EntityScan<'_>> {
        let keys: Vec<EntityReference> = self.entries.read().keys().cloned().collect();
        let entries = Arc::clone(&self.entries);
        // Entries removed after the scan started are skipped
        Ok(Box::new(
            keys.into_iter()
                .filter_map(move |key| entries.read().get(&key).cloned().map(Ok)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: &str) -> EntityReference {
        EntityReference::new(id)
    }

    fn insert(store: &MemoryMapStore, id: &str, data: &[u8]) {
        let mut changes = ChangeBuffer::new();
        changes.new_entity(r(id), "T", data.to_vec());
        store.apply_changes(&changes).unwrap();
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryMapStore::new();
        assert!(store.is_empty());
        assert_eq!(store.scan_all().unwrap().count(), 0);
    }

    #[test]
    fn memory_get_missing_fails() {
        let store = MemoryMapStore::new();
        let result = store.get(&r("missing"));
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn memory_insert_update_remove() {
        let store = MemoryMapStore::new();
        insert(&store, "a", b"v1");
        assert_eq!(store.get(&r("a")).unwrap(), b"v1");

        let mut update = ChangeBuffer::new();
        update.update_entity(r("a"), "T", b"v2".to_vec());
        store.apply_changes(&update).unwrap();
        assert_eq!(store.get(&r("a")).unwrap(), b"v2");

        let mut remove = ChangeBuffer::new();
        remove.remove_entity(r("a"), "T");
        store.apply_changes(&remove).unwrap();
        assert!(!store.contains(&r("a")).unwrap());
    }

    #[test]
    fn memory_failed_change_set_leaves_store_untouched() {
        let store = MemoryMapStore::new();
        insert(&store, "a", b"v1");

        let mut changes = ChangeBuffer::new();
        changes.update_entity(r("a"), "T", b"v2".to_vec());
        changes.new_entity(r("b"), "T", b"new".to_vec());
        changes.new_entity(r("a2"), "T", b"x".to_vec());
        changes.update_entity(r("missing"), "T", b"boom".to_vec());

        let result = store.apply_changes(&changes);
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert_eq!(store.get(&r("a")).unwrap(), b"v1");
        assert!(!store.contains(&r("b")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_scan_is_restartable() {
        let store = MemoryMapStore::new();
        insert(&store, "a", b"1");
        insert(&store, "b", b"2");

        let first: Vec<_> = store.scan_all().unwrap().map(Result::unwrap).collect();
        let second: Vec<_> = store.scan_all().unwrap().map(Result::unwrap).collect();
        assert_eq!(first, vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(first, second);
    }

    #[test]
    fn memory_clones_share_entries() {
        let store = MemoryMapStore::new();
        let other = store.clone();
        insert(&store, "a", b"1");
        assert_eq!(other.get(&r("a")).unwrap(), b"1");
        other.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_commit_lock_is_shared() {
        let store = MemoryMapStore::new();
        let other = store.clone();
        let held = store.commit_lock().lock_arc();
        assert!(other.commit_lock().try_lock().is_none());
        assert!(store.commit_lock().try_lock().is_none());
        drop(held);
        assert!(other.commit_lock().try_lock().is_some());
    }
}
