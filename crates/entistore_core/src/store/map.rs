//! EntityStore over a narrow key-value storage adapter.

use super::{EntityStateStream, EntityStore, EntityStoreTransaction, StateCommitter};
use crate::entity::{EntityDescriptor, EntityModel, EntityState, EntityStatus};
use crate::error::{CoreError, CoreResult};
use crate::serializer::EntityStateSerializer;
use crate::usecase::Usecase;
use chrono::{DateTime, Utc};
use entistore_codec::{Envelope, EnvelopeFormat};
use entistore_storage::{ChangeBuffer, EntityReference, StorageAdapter};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::RawMutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An [`EntityStore`] for any [`StorageAdapter`].
///
/// Entities are stored as serialized envelopes keyed by reference. The
/// version check and the write are made atomic by the adapter's
/// [`StorageAdapter::commit_lock`], held from
/// [`EntityStoreTransaction::apply_changes`] until the returned committer
/// commits or cancels. Every store over the same adapter takes the same
/// lock. Adapters apply each change set all-or-nothing, so a failed write
/// leaves nothing behind.
///
/// # Example
///
/// ```rust
/// use entistore_codec::ValueType;
/// use entistore_core::{EntityDescriptor, EntityModel, MapEntityStore};
/// use entistore_storage::MemoryMapStore;
/// use std::sync::Arc;
///
/// let model = EntityModel::new()
///     .with_type(EntityDescriptor::new("Person").property("name", ValueType::Text))
///     .unwrap();
/// let store = MapEntityStore::new(Arc::new(MemoryMapStore::new()), Arc::new(model));
/// ```
#[derive(Clone)]
pub struct MapEntityStore {
    adapter: Arc<dyn StorageAdapter>,
    serializer: EntityStateSerializer,
}

impl MapEntityStore {
    /// Creates a store over `adapter` writing JSON envelopes.
    pub fn new(adapter: Arc<dyn StorageAdapter>, model: Arc<EntityModel>) -> Self {
        Self {
            adapter,
            serializer: EntityStateSerializer::new(model),
        }
    }

    /// Sets the envelope format for writes.
    #[must_use]
    pub fn with_format(mut self, format: EnvelopeFormat) -> Self {
        self.serializer = self.serializer.with_format(format);
        self
    }

    /// The underlying adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// The serializer used for every read and write.
    #[must_use]
    pub fn serializer(&self) -> &EntityStateSerializer {
        &self.serializer
    }
}

impl fmt::Debug for MapEntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapEntityStore")
            .field("format", &self.serializer.format())
            .finish_non_exhaustive()
    }
}

impl EntityStore for MapEntityStore {
    fn begin_transaction(
        &self,
        usecase: &Usecase,
        current_time: DateTime<Utc>,
    ) -> CoreResult<Box<dyn EntityStoreTransaction>> {
        Ok(Box::new(MapStoreTransaction {
            adapter: Arc::clone(&self.adapter),
            serializer: self.serializer.clone(),
            usecase: usecase.clone(),
            current_time,
        }))
    }

    fn entity_states(&self) -> CoreResult<EntityStateStream<'_>> {
        let scan = self.adapter.scan_all()?;
        Ok(Box::new(scan.map(move |item| {
            let bytes = item?;
            self.serializer.decode(&bytes)
        })))
    }
}

struct MapStoreTransaction {
    adapter: Arc<dyn StorageAdapter>,
    serializer: EntityStateSerializer,
    usecase: Usecase,
    current_time: DateTime<Utc>,
}

impl MapStoreTransaction {
    /// Version currently stored for `reference`, `None` if absent.
    fn stored_version(&self, reference: &EntityReference) -> CoreResult<Option<u64>> {
        match self.adapter.get(reference) {
            Ok(bytes) => Ok(Some(Envelope::decode(&bytes)?.version)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl EntityStoreTransaction for MapStoreTransaction {
    fn usecase(&self) -> &Usecase {
        &self.usecase
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    fn entity_state_of(&mut self, reference: &EntityReference) -> CoreResult<EntityState> {
        match self.adapter.get(reference) {
            Ok(bytes) => self.serializer.decode(&bytes),
            Err(e) if e.is_not_found() => Err(CoreError::not_found(reference)),
            Err(e) => Err(e.into()),
        }
    }

    fn new_entity_state(
        &mut self,
        reference: EntityReference,
        descriptor: &Arc<EntityDescriptor>,
    ) -> CoreResult<EntityState> {
        Ok(EntityState::new(reference, Arc::clone(descriptor)))
    }

    fn apply_changes(&mut self, states: &[&EntityState]) -> CoreResult<Box<dyn StateCommitter>> {
        let guard = self.adapter.commit_lock().lock_arc();

        let mut conflicts = Vec::new();
        for state in states {
            let conflict = match state.status() {
                EntityStatus::New => self.adapter.contains(state.reference())?,
                EntityStatus::Updated | EntityStatus::Removed => {
                    self.stored_version(state.reference())? != Some(state.version())
                }
                EntityStatus::Loaded => false,
            };
            if conflict {
                conflicts.push(state.reference().clone());
            }
        }
        if !conflicts.is_empty() {
            debug!(
                usecase = %self.usecase,
                conflicts = conflicts.len(),
                "rejecting change set"
            );
            return Err(CoreError::ConcurrentModification {
                references: conflicts,
            });
        }

        let mut changes = ChangeBuffer::new();
        for state in states {
            let reference = state.reference().clone();
            let entity_type = state.entity_type();
            match state.status() {
                EntityStatus::New => {
                    let data = self.serializer.encode_as(state, 1, self.current_time)?;
                    changes.new_entity(reference, entity_type, data);
                }
                EntityStatus::Updated => {
                    let data =
                        self.serializer
                            .encode_as(state, state.version() + 1, self.current_time)?;
                    changes.update_entity(reference, entity_type, data);
                }
                EntityStatus::Removed => changes.remove_entity(reference, entity_type),
                EntityStatus::Loaded => {}
            }
        }

        Ok(Box::new(MapStateCommitter {
            adapter: Arc::clone(&self.adapter),
            changes,
            _guard: guard,
        }))
    }
}

struct MapStateCommitter {
    adapter: Arc<dyn StorageAdapter>,
    changes: ChangeBuffer,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl StateCommitter for MapStateCommitter {
    fn commit(self: Box<Self>) -> CoreResult<()> {
        self.adapter.apply_changes(&self.changes)?;
        debug!(changes = self.changes.len(), "committed change set");
        Ok(())
    }

    fn cancel(self: Box<Self>) {
        debug!(changes = self.changes.len(), "cancelled change set");
    }
}
