//! The EntityStore SPI.
//!
//! A unit of work talks to storage only through these traits:
//!
//! 1. [`EntityStore::begin_transaction`] opens a transaction per unit of work
//! 2. [`EntityStoreTransaction::entity_state_of`] loads entities on demand
//! 3. [`EntityStoreTransaction::apply_changes`] checks versions and stages
//!    the change set, returning a [`StateCommitter`]
//! 4. [`StateCommitter::commit`] or [`StateCommitter::cancel`] finishes it
//!
//! [`MapEntityStore`] implements the SPI over any narrow
//! [`StorageAdapter`](entistore_storage::StorageAdapter).

mod map;

pub use map::MapEntityStore;

use crate::entity::{EntityDescriptor, EntityState};
use crate::error::CoreResult;
use crate::usecase::Usecase;
use chrono::{DateTime, Utc};
use entistore_storage::EntityReference;
use std::sync::Arc;

/// Lazy sequence of every stored entity state.
pub type EntityStateStream<'a> = Box<dyn Iterator<Item = CoreResult<EntityState>> + Send + 'a>;

/// A full-featured entity store.
pub trait EntityStore: Send + Sync {
    /// Begins a transaction for one unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin_transaction(
        &self,
        usecase: &Usecase,
        current_time: DateTime<Utc>,
    ) -> CoreResult<Box<dyn EntityStoreTransaction>>;

    /// Streams every stored entity, for bulk re-indexing and export. Not
    /// transactional.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot start. Individual items carry
    /// their own decode errors.
    fn entity_states(&self) -> CoreResult<EntityStateStream<'_>>;
}

/// A backend-scoped handle serving one unit of work.
pub trait EntityStoreTransaction: Send {
    /// Usecase of the owning unit of work.
    fn usecase(&self) -> &Usecase;

    /// Time stamped on everything this transaction commits.
    fn current_time(&self) -> DateTime<Utc>;

    /// Loads the persisted state of an entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such entity is stored.
    fn entity_state_of(&mut self, reference: &EntityReference) -> CoreResult<EntityState>;

    /// Creates the state for a new entity.
    ///
    /// # Errors
    ///
    /// Stores that check eagerly may return `AlreadyExists`.
    fn new_entity_state(
        &mut self,
        reference: EntityReference,
        descriptor: &Arc<EntityDescriptor>,
    ) -> CoreResult<EntityState>;

    /// Checks every changed state against the store and stages the
    /// change set.
    ///
    /// Updated and removed states must still be stored at the version they
    /// were loaded at; new states must not be stored at all. Any mismatch
    /// rejects the whole set with `ConcurrentModification` naming every
    /// conflicting reference, and nothing is staged.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` on conflict, or a backend fault.
    fn apply_changes(&mut self, states: &[&EntityState]) -> CoreResult<Box<dyn StateCommitter>>;
}

/// One-shot handle finishing a staged change set.
///
/// Both methods consume the handle, so exactly one of them runs.
pub trait StateCommitter: Send {
    /// Durably writes the staged changes, each written entity getting
    /// `version + 1` and the transaction's current time.
    ///
    /// # Errors
    ///
    /// Returns a backend fault if the write fails. Nothing is written then.
    fn commit(self: Box<Self>) -> CoreResult<()>;

    /// Drops the staged changes, leaving the store as it was.
    fn cancel(self: Box<Self>);
}
