//! Narrow storage adapter contract.

use crate::error::{StorageError, StorageResult};
use crate::reference::EntityReference;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;

/// Shared lock serializing version-checked commits against one adapter.
pub type CommitLock = Arc<Mutex<()>>;

/// A lazy, finite pass over every stored entity's serialized bytes.
pub type EntityScan<'a> = Box<dyn Iterator<Item = StorageResult<Vec<u8>>> + Send + 'a>;

/// The minimal contract a key-value backend implements.
///
/// Adapters store the serialized envelope of each entity under its
/// [`EntityReference`]. They know nothing about versions or entity states.
///
/// # Invariants
///
/// - `get` returns exactly the bytes last written for the reference
/// - `apply_changes` is all-or-nothing: if it returns an error, no entry
///   was modified
/// - `scan_all` may be called any number of times; each call starts a new
///   pass
/// - Adapters must be `Send + Sync` for concurrent access
/// - `commit_lock` returns the same lock on every call, so every writer
///   over one adapter serializes on it
///
/// # Implementors
///
/// - [`super::MemoryMapStore`] - For testing
/// - [`super::LogMapStore`] - For persistent storage
pub trait StorageAdapter: Send + Sync {
    /// Reads the serialized entity stored under `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored under the
    /// reference, or an I/O error.
    fn get(&self, reference: &EntityReference) -> StorageResult<Vec<u8>>;

    /// Returns whether an entry exists for `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn contains(&self, reference: &EntityReference) -> StorageResult<bool> {
        match self.get(reference) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Applies a change set atomically.
    ///
    /// The adapter visits `changes` with its own [`MapChanger`]; every
    /// writer the changer hands out is finalized by [`EntityWriter::close`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] when a new entity's reference
    /// is taken, [`StorageError::NotFound`] when an updated or removed
    /// reference is missing, or an I/O error.
    fn apply_changes(&self, changes: &dyn MapChanges) -> StorageResult<()>;

    /// The lock a version-checking writer holds from reading the stored
    /// versions until its change set is applied or dropped.
    ///
    /// The adapter owns it, so independent stores over the same adapter
    /// cannot both pass a check on the same version.
    fn commit_lock(&self) -> CommitLock;

    /// Starts a pass over all stored entities.
    ///
    /// Used for bulk re-indexing and streaming, never for transactional
    /// reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be started.
    fn scan_all(&self) -> StorageResult<EntityScan<'_>>;
}

/// A writable sink for one entity's serialized state.
///
/// Dropping a writer without calling [`EntityWriter::close`] abandons the
/// write for that entity.
pub trait EntityWriter: Write {
    /// Finalizes the write for this entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the entity.
    fn close(self: Box<Self>) -> StorageResult<()>;
}

/// Receives the per-entity operations of a change set.
pub trait MapChanger {
    /// Opens a sink for an entity that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be opened.
    fn new_entity(
        &mut self,
        reference: &EntityReference,
        entity_type: &str,
    ) -> StorageResult<Box<dyn EntityWriter + '_>>;

    /// Opens a sink that replaces an existing entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be opened.
    fn update_entity(
        &mut self,
        reference: &EntityReference,
        entity_type: &str,
    ) -> StorageResult<Box<dyn EntityWriter + '_>>;

    /// Removes an existing entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be recorded.
    fn remove_entity(&mut self, reference: &EntityReference, entity_type: &str)
        -> StorageResult<()>;
}

/// A change set that can replay itself into a [`MapChanger`].
pub trait MapChanges {
    /// Delivers every change to `changer`.
    ///
    /// # Errors
    ///
    /// Propagates any error from the changer or its writers.
    fn visit(&self, changer: &mut dyn MapChanger) -> StorageResult<()>;
}

/// Kind of a staged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Create an entity that must not exist.
    New,
    /// Replace an existing entity.
    Update,
    /// Delete an existing entity.
    Remove,
}

/// One staged entity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Entity being changed.
    pub reference: EntityReference,
    /// Type name of the entity.
    pub entity_type: String,
    /// Serialized state (empty for removals).
    pub data: Vec<u8>,
}

/// An in-memory change set.
///
/// `ChangeBuffer` is both a [`MapChanges`] (it can be applied to an
/// adapter) and a [`MapChanger`] (adapters use it to stage an incoming
/// change set before touching their own entries).
#[derive(Debug, Clone, Default)]
pub struct ChangeBuffer {
    changes: Vec<StagedChange>,
}

impl ChangeBuffer {
    /// Creates an empty change buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages every change of `changes` into a new buffer.
    ///
    /// # Errors
    ///
    /// Propagates errors raised while visiting the change set.
    pub fn collect(changes: &dyn MapChanges) -> StorageResult<Self> {
        let mut buffer = Self::new();
        changes.visit(&mut buffer)?;
        Ok(buffer)
    }

    /// Stages a new entity.
    pub fn new_entity(&mut self, reference: EntityReference, entity_type: &str, data: Vec<u8>) {
        self.push(ChangeKind::New, reference, entity_type, data);
    }

    /// Stages an update.
    pub fn update_entity(
        &mut self,
        reference: EntityReference,
        entity_type: &str,
        data: Vec<u8>,
    ) {
        self.push(ChangeKind::Update, reference, entity_type, data);
    }

    /// Stages a removal.
    pub fn remove_entity(&mut self, reference: EntityReference, entity_type: &str) {
        self.push(ChangeKind::Remove, reference, entity_type, Vec::new());
    }

    fn push(
        &mut self,
        kind: ChangeKind,
        reference: EntityReference,
        entity_type: &str,
        data: Vec<u8>,
    ) {
        self.changes.push(StagedChange {
            kind,
            reference,
            entity_type: entity_type.to_string(),
            data,
        });
    }

    /// Returns the staged changes in order.
    #[must_use]
    pub fn changes(&self) -> &[StagedChange] {
        &self.changes
    }

    /// Consumes the buffer, returning the staged changes.
    #[must_use]
    pub fn into_changes(self) -> Vec<StagedChange> {
        self.changes
    }

    /// Returns the number of staged changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Checks the staged changes against the entries that currently exist.
    ///
    /// `exists` reports whether the backend holds an entry for a reference.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: a duplicate reference, a new
    /// entity that already exists, or an update/removal of a missing entity.
    pub fn validate<F>(&self, mut exists: F) -> StorageResult<()>
    where
        F: FnMut(&EntityReference) -> StorageResult<bool>,
    {
        let mut seen = HashSet::with_capacity(self.changes.len());
        for change in &self.changes {
            if !seen.insert(&change.reference) {
                return Err(StorageError::DuplicateChange {
                    reference: change.reference.clone(),
                });
            }
            let present = exists(&change.reference)?;
            match change.kind {
                ChangeKind::New if present => {
                    return Err(StorageError::already_exists(&change.reference));
                }
                ChangeKind::Update | ChangeKind::Remove if !present => {
                    return Err(StorageError::not_found(&change.reference));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl MapChanges for ChangeBuffer {
    fn visit(&self, changer: &mut dyn MapChanger) -> StorageResult<()> {
        for change in &self.changes {
            match change.kind {
                ChangeKind::New => {
                    let mut writer = changer.new_entity(&change.reference, &change.entity_type)?;
                    writer.write_all(&change.data)?;
                    writer.close()?;
                }
                ChangeKind::Update => {
                    let mut writer =
                        changer.update_entity(&change.reference, &change.entity_type)?;
                    writer.write_all(&change.data)?;
                    writer.close()?;
                }
                ChangeKind::Remove => {
                    changer.remove_entity(&change.reference, &change.entity_type)?;
                }
            }
        }
        Ok(())
    }
}

impl MapChanger for ChangeBuffer {
    fn new_entity(
        &mut self,
        reference: &EntityReference,
        entity_type: &str,
    ) -> StorageResult<Box<dyn EntityWriter + '_>> {
        Ok(Box::new(BufferWriter::new(
            &mut self.changes,
            ChangeKind::New,
            reference,
            entity_type,
        )))
    }

    fn update_entity(
        &mut self,
        reference: &EntityReference,
        entity_type: &str,
    ) -> StorageResult<Box<dyn EntityWriter + '_>> {
        Ok(Box::new(BufferWriter::new(
            &mut self.changes,
            ChangeKind::Update,
            reference,
            entity_type,
        )))
    }

    fn remove_entity(
        &mut self,
        reference: &EntityReference,
        entity_type: &str,
    ) -> StorageResult<()> {
        ChangeBuffer::remove_entity(self, reference.clone(), entity_type);
        Ok(())
    }
}

/// Writer that stages its bytes into a change list on close.
struct BufferWriter<'a> {
    target: &'a mut Vec<StagedChange>,
    kind: ChangeKind,
    reference: EntityReference,
    entity_type: String,
    data: Vec<u8>,
}

impl<'a> BufferWriter<'a> {
    fn new(
        target: &'a mut Vec<StagedChange>,
        kind: ChangeKind,
        reference: &EntityReference,
        entity_type: &str,
    ) -> Self {
        Self {
            target,
            kind,
            reference: reference.clone(),
            entity_type: entity_type.to_string(),
            data: Vec::with_capacity(256),
        }
    }
}

impl Write for BufferWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl EntityWriter for BufferWriter<'_> {
    fn close(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.target.push(StagedChange {
            kind: this.kind,
            reference: this.reference,
            entity_type: this.entity_type,
            data: this.data,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: &str) -> EntityReference {
        EntityReference::new(id)
    }

    #[test]
    fn collect_replays_all_changes() {
        let mut source = ChangeBuffer::new();
        source.new_entity(r("a"), "T", b"1".to_vec());
        source.update_entity(r("b"), "T", b"2".to_vec());
        source.remove_entity(r("c"), "T");

        let staged = ChangeBuffer::collect(&source).unwrap();
        assert_eq!(staged.changes(), source.changes());
    }

    #[test]
    fn unclosed_writer_is_abandoned() {
        let mut buffer = ChangeBuffer::new();
        {
            let mut writer = MapChanger::new_entity(&mut buffer, &r("a"), "T").unwrap();
            writer.write_all(b"data").unwrap();
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn validate_rejects_existing_new_entity() {
        let mut buffer = ChangeBuffer::new();
        buffer.new_entity(r("a"), "T", vec![]);
        let result = buffer.validate(|_| Ok(true));
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn validate_rejects_missing_update_and_remove() {
        let mut update = ChangeBuffer::new();
        update.update_entity(r("a"), "T", vec![]);
        assert!(matches!(
            update.validate(|_| Ok(false)),
            Err(StorageError::NotFound { .. })
        ));

        let mut remove = ChangeBuffer::new();
        remove.remove_entity(r("a"), "T");
        assert!(matches!(
            remove.validate(|_| Ok(false)),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicates() {
        let mut buffer = ChangeBuffer::new();
        buffer.new_entity(r("a"), "T", vec![]);
        buffer.remove_entity(r("a"), "T");
        assert!(matches!(
            buffer.validate(|_| Ok(false)),
            Err(StorageError::DuplicateChange { .. })
        ));
    }
}
