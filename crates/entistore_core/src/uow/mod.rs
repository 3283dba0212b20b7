//! The Unit of Work: a caller-facing session over entity states.
//!
//! A unit of work caches every entity it creates or loads, tracks their
//! changes and persists the net change set atomically on
//! [`UnitOfWork::complete`]. Conflicting writers are detected at that
//! point by version comparison.
//!
//! ## Lifecycle
//!
//! ```text
//!            pause             complete / discard
//!   Open  <-------->  Paused  ------------------>  Closed
//!     |               resume                          ^
//!     +-----------------------------------------------+
//! ```
//!
//! Closing happens exactly once. A failed completion discards.

mod context;
mod policy;
mod retry;

pub use context::UnitOfWorkContext;
pub use policy::{Attempt, DiscardPolicy, Propagation, UnitOfWorkPolicy};
pub use retry::RetryConfig;

use crate::config::Config;
use crate::entity::{EntityModel, EntityState, EntityStatus, IdentityGenerator, UuidIdentityGenerator};
use crate::error::{CoreError, CoreResult};
use crate::store::{EntityStore, EntityStoreTransaction};
use crate::usecase::Usecase;
use chrono::{DateTime, TimeZone, Utc};
use entistore_storage::EntityReference;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// Usable.
    Open,
    /// Detached from its context; must be resumed before use.
    Paused,
    /// Completed or discarded. Terminal.
    Closed,
}

/// How a unit of work closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Changes were persisted.
    Completed,
    /// Changes were dropped.
    Discarded,
}

/// Hooks around completion of a unit of work.
pub trait UnitOfWorkCallback: Send {
    /// Runs before the change set is applied. An error aborts completion
    /// and discards the unit of work.
    ///
    /// # Errors
    ///
    /// Any error vetoes the completion.
    fn before_completion(&mut self) -> CoreResult<()> {
        Ok(())
    }

    /// Runs once, after the unit of work closed.
    fn after_completion(&mut self, status: CompletionStatus) {
        let _ = status;
    }
}

/// Identifies a callback registered with [`UnitOfWork::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// A session tracking entity changes until they are completed or
/// discarded.
///
/// Obtained from a [`UnitOfWorkFactory`]. Not shared between tasks: every
/// operation takes `&mut self`, and moving a unit of work between contexts
/// goes through [`UnitOfWorkContext::pause`] and
/// [`UnitOfWorkContext::resume`].
pub struct UnitOfWork {
    id: u64,
    usecase: Usecase,
    current_time: DateTime<Utc>,
    state: UnitOfWorkState,
    model: Arc<EntityModel>,
    identities: Arc<dyn IdentityGenerator>,
    config: Arc<Config>,
    transaction: Option<Box<dyn EntityStoreTransaction>>,
    cache: BTreeMap<EntityReference, EntityState>,
    callbacks: Vec<(CallbackId, Box<dyn UnitOfWorkCallback>)>,
    next_callback: u64,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("usecase", &self.usecase)
            .field("state", &self.state)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    /// Identifier, unique per factory. Used in logs.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The usecase this unit of work serves.
    #[must_use]
    pub fn usecase(&self) -> &Usecase {
        &self.usecase
    }

    /// Time stamped on everything this unit of work commits.
    #[must_use]
    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Whether the unit of work has not been closed yet. A paused unit
    /// of work is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != UnitOfWorkState::Closed
    }

    /// Whether the unit of work is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == UnitOfWorkState::Paused
    }

    /// Number of cached entity states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no entity states are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Registers a completion callback. Callbacks run in registration
    /// order.
    ///
    /// # Errors
    ///
    /// Fails if the unit of work is paused or closed.
    pub fn add_callback(
        &mut self,
        callback: impl UnitOfWorkCallback + 'static,
    ) -> CoreResult<CallbackId> {
        self.ensure_active()?;
        self.next_callback += 1;
        let id = CallbackId(self.next_callback);
        self.callbacks.push((id, Box::new(callback)));
        Ok(id)
    }

    /// Unregisters a callback. It is not notified of completion. Returns
    /// whether the callback was registered.
    ///
    /// # Errors
    ///
    /// Fails if the unit of work is paused or closed.
    pub fn remove_callback(&mut self, id: CallbackId) -> CoreResult<bool> {
        self.ensure_active()?;
        match self.callbacks.iter().position(|(registered, _)| *registered == id) {
            Some(index) => {
                self.callbacks.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Creates a new entity of `entity_type`.
    ///
    /// Without an identity, one is generated. Properties start at their
    /// declared defaults.
    ///
    /// # Errors
    ///
    /// - `UnknownEntityType` if the type is not in the model
    /// - `AlreadyExists` if the reference is already cached, or, with
    ///   [`Config::precheck_new_identity`], already stored. Existence is
    ///   checked again at completion regardless.
    /// - `UnitOfWorkPaused` / `UnitOfWorkClosed` when not open
    pub fn new_entity(
        &mut self,
        entity_type: &str,
        identity: Option<&str>,
    ) -> CoreResult<&mut EntityState> {
        self.ensure_active()?;
        let descriptor = Arc::clone(self.model.descriptor(entity_type)?);
        let identity = match identity {
            Some(identity) => identity.to_string(),
            None => self.identities.generate(entity_type),
        };
        let reference = EntityReference::parse(&identity)
            .ok_or_else(|| CoreError::invalid_operation("entity identity must not be blank"))?;

        // A new entity removed again in this unit of work never existed
        if let Some(existing) = self.cache.get(&reference) {
            if existing.status() != EntityStatus::Removed || existing.is_persisted() {
                return Err(CoreError::already_exists(&reference));
            }
        }
        if self.config.precheck_new_identity {
            match self.transaction()?.entity_state_of(&reference) {
                Ok(_) => return Err(CoreError::already_exists(&reference)),
                Err(CoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let state = self
            .transaction()?
            .new_entity_state(reference.clone(), &descriptor)?;
        debug!(uow = self.id, reference = %reference, entity_type, "created entity");

        let slot = match self.cache.entry(reference) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                *slot = state;
                slot
            }
            Entry::Vacant(entry) => entry.insert(state),
        };
        Ok(slot)
    }

    /// Gets an entity by type and identity.
    ///
    /// See [`UnitOfWork::get_by_reference`].
    ///
    /// # Errors
    ///
    /// As [`UnitOfWork::get_by_reference`].
    pub fn get(&mut self, entity_type: &str, identity: &str) -> CoreResult<&mut EntityState> {
        self.get_by_reference(entity_type, &EntityReference::new(identity))
    }

    /// Gets an entity, loading it from the store unless already cached.
    ///
    /// # Errors
    ///
    /// - `NotFound` if it is not stored, or was removed in this unit of work
    /// - `TypeMismatch` if it is neither `entity_type` nor a subtype
    /// - `UnknownEntityType` if `entity_type` is not in the model
    /// - `BackendFault` / codec errors from loading
    pub fn get_by_reference(
        &mut self,
        entity_type: &str,
        reference: &EntityReference,
    ) -> CoreResult<&mut EntityState> {
        self.ensure_active()?;
        self.model.descriptor(entity_type)?;

        if !self.cache.contains_key(reference) {
            let state = self.transaction()?.entity_state_of(reference)?;
            debug!(uow = self.id, reference = %reference, version = state.version(), "loaded entity");
            self.cache.insert(reference.clone(), state);
        }

        let state = self
            .cache
            .get_mut(reference)
            .ok_or_else(|| CoreError::not_found(reference))?;
        if state.status() == EntityStatus::Removed {
            return Err(CoreError::not_found(reference));
        }
        if !state.is_assignable_to(entity_type) {
            return Err(CoreError::TypeMismatch {
                reference: reference.clone(),
                expected: entity_type.to_string(),
                found: state.entity_type().to_string(),
            });
        }
        Ok(state)
    }

    /// A cached state, whatever its status.
    #[must_use]
    pub fn cached(&self, reference: &EntityReference) -> Option<&EntityState> {
        self.cache.get(reference)
    }

    /// Mutable access to a cached state, whatever its status. Mutating a
    /// removed state fails on the state itself.
    ///
    /// # Errors
    ///
    /// `NotFound` if not cached; `UnitOfWorkPaused` / `UnitOfWorkClosed`
    /// when not open.
    pub fn cached_mut(&mut self, reference: &EntityReference) -> CoreResult<&mut EntityState> {
        self.ensure_active()?;
        self.cache
            .get_mut(reference)
            .ok_or_else(|| CoreError::not_found(reference))
    }

    /// Iterates over cached states.
    pub fn cached_states(&self) -> impl Iterator<Item = &EntityState> {
        self.cache.values()
    }

    /// Marks a cached entity as removed. A new entity removed in the same
    /// unit of work is left out of the change set.
    ///
    /// # Errors
    ///
    /// `NotFound` if the entity is not cached; `EntityRemoved` if it is
    /// already removed.
    pub fn remove(&mut self, reference: &EntityReference) -> CoreResult<()> {
        self.ensure_active()?;
        let state = self
            .cache
            .get_mut(reference)
            .ok_or_else(|| CoreError::not_found(reference))?;
        state.mark_removed()?;
        debug!(uow = self.id, reference = %reference, "removed entity");
        Ok(())
    }

    /// Persists every change and closes the unit of work.
    ///
    /// Callbacks' `before_completion` run first. Then new, updated and
    /// removed states go to the store as one change set, which is version
    /// checked and committed.
    ///
    /// # Errors
    ///
    /// `UnitOfWorkPaused` / `UnitOfWorkClosed` if not open; nothing else
    /// happens then. Any other failure discards the unit of work and is
    /// returned as `CompletionFailed` wrapping the cause.
    pub fn complete(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        match self.apply_and_commit() {
            Ok(changes) => {
                self.close(CompletionStatus::Completed);
                debug!(uow = self.id, usecase = %self.usecase, changes, "completed unit of work");
                Ok(())
            }
            Err(e) => {
                if e.is_concurrent_modification() {
                    warn!(
                        uow = self.id,
                        usecase = %self.usecase,
                        conflicts = e.conflicting_references().len(),
                        "concurrent modification"
                    );
                } else {
                    warn!(uow = self.id, usecase = %self.usecase, error = %e, "completion failed");
                }
                self.discard();
                Err(CoreError::completion_failed(e))
            }
        }
    }

    fn apply_and_commit(&mut self) -> CoreResult<usize> {
        for (_, callback) in &mut self.callbacks {
            callback.before_completion()?;
        }

        let changed: Vec<&EntityState> = self.cache.values().filter(|s| is_change(s)).collect();
        if changed.is_empty() {
            return Ok(0);
        }
        let transaction = self
            .transaction
            .as_mut()
            .ok_or(CoreError::UnitOfWorkClosed)?;
        let committer = transaction.apply_changes(&changed)?;
        committer.commit()?;
        Ok(changed.len())
    }

    /// Drops every change and closes the unit of work.
    ///
    /// Idempotent: calling it on a closed unit of work, including after a
    /// failed completion, does nothing. Never touches the store.
    pub fn discard(&mut self) {
        if self.state == UnitOfWorkState::Closed {
            return;
        }
        let dropped = self.cache.len();
        self.close(CompletionStatus::Discarded);
        debug!(uow = self.id, usecase = %self.usecase, dropped, "discarded unit of work");
    }

    fn close(&mut self, status: CompletionStatus) {
        self.state = UnitOfWorkState::Closed;
        self.cache.clear();
        self.transaction = None;
        for (_, mut callback) in std::mem::take(&mut self.callbacks) {
            callback.after_completion(status);
        }
    }

    pub(crate) fn mark_paused(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.state = UnitOfWorkState::Paused;
        Ok(())
    }

    pub(crate) fn mark_resumed(&mut self) -> CoreResult<()> {
        match self.state {
            UnitOfWorkState::Paused => {
                self.state = UnitOfWorkState::Open;
                Ok(())
            }
            UnitOfWorkState::Open => Err(CoreError::invalid_operation(
                "unit of work is not paused",
            )),
            UnitOfWorkState::Closed => Err(CoreError::UnitOfWorkClosed),
        }
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            UnitOfWorkState::Open => Ok(()),
            UnitOfWorkState::Paused => Err(CoreError::UnitOfWorkPaused),
            UnitOfWorkState::Closed => Err(CoreError::UnitOfWorkClosed),
        }
    }

    fn transaction(&mut self) -> CoreResult<&mut dyn EntityStoreTransaction> {
        match self.transaction.as_deref_mut() {
            Some(transaction) => Ok(transaction),
            None => Err(CoreError::UnitOfWorkClosed),
        }
    }
}

fn is_change(state: &EntityState) -> bool {
    match state.status() {
        EntityStatus::New | EntityStatus::Updated => true,
        EntityStatus::Removed => state.is_persisted(),
        EntityStatus::Loaded => false,
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Closed {
            return;
        }
        if self.config.discard_on_drop {
            warn!(uow = self.id, usecase = %self.usecase, "unit of work dropped while open, discarding");
            self.discard();
        }
    }
}

/// Creates units of work over one store and model.
pub struct UnitOfWorkFactory {
    store: Arc<dyn EntityStore>,
    model: Arc<EntityModel>,
    identities: Arc<dyn IdentityGenerator>,
    config: Arc<Config>,
    next_id: AtomicU64,
}

impl fmt::Debug for UnitOfWorkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWorkFactory")
            .field("config", &self.config)
            .field("created", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl UnitOfWorkFactory {
    /// Creates a factory generating UUID identities.
    pub fn new(store: Arc<dyn EntityStore>, model: Arc<EntityModel>, config: Config) -> Self {
        Self {
            store,
            model,
            identities: Arc::new(UuidIdentityGenerator),
            config: Arc::new(config),
            next_id: AtomicU64::new(0),
        }
    }

    /// Uses `generator` for entities created without an identity.
    #[must_use]
    pub fn with_identity_generator(mut self, generator: Arc<dyn IdentityGenerator>) -> Self {
        self.identities = generator;
        self
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// The entity model.
    #[must_use]
    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a unit of work with the default usecase.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot begin a transaction.
    pub fn new_unit_of_work(&self) -> CoreResult<UnitOfWork> {
        self.new_unit_of_work_with(Usecase::new(&self.config.default_usecase))
    }

    /// Opens a unit of work for `usecase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot begin a transaction.
    pub fn new_unit_of_work_with(&self, usecase: Usecase) -> CoreResult<UnitOfWork> {
        self.new_unit_of_work_at(usecase, now_millis())
    }

    /// Opens a unit of work for `usecase` whose commits are stamped with
    /// `current_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot begin a transaction.
    pub fn new_unit_of_work_at(
        &self,
        usecase: Usecase,
        current_time: DateTime<Utc>,
    ) -> CoreResult<UnitOfWork> {
        let transaction = self.store.begin_transaction(&usecase, current_time)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(uow = id, usecase = %usecase, "opened unit of work");
        Ok(UnitOfWork {
            id,
            usecase,
            current_time,
            state: UnitOfWorkState::Open,
            model: Arc::clone(&self.model),
            identities: Arc::clone(&self.identities),
            config: Arc::clone(&self.config),
            transaction: Some(transaction),
            cache: BTreeMap::new(),
            callbacks: Vec::new(),
            next_callback: 0,
        })
    }
}

/// Envelopes keep millisecond precision, so commit times do too.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDescriptor;
    use crate::store::MapEntityStore;
    use entistore_codec::ValueType;
    use entistore_storage::MemoryMapStore;
    use parking_lot::Mutex;

    fn factory() -> UnitOfWorkFactory {
        factory_with(Config::default())
    }

    fn factory_with(config: Config) -> UnitOfWorkFactory {
        let model = Arc::new(
            EntityModel::new()
                .with_type(EntityDescriptor::new("Item").property("n", ValueType::Integer))
                .unwrap(),
        );
        let store = MapEntityStore::new(Arc::new(MemoryMapStore::new()), Arc::clone(&model));
        UnitOfWorkFactory::new(Arc::new(store), model, config)
    }

    struct Recorder(Arc<Mutex<Vec<CompletionStatus>>>);

    impl UnitOfWorkCallback for Recorder {
        fn after_completion(&mut self, status: CompletionStatus) {
            self.0.lock().push(status);
        }
    }

    struct Veto;

    impl UnitOfWorkCallback for Veto {
        fn before_completion(&mut self) -> CoreResult<()> {
            Err(CoreError::invalid_operation("vetoed"))
        }
    }

    #[test]
    fn closed_unit_of_work_rejects_operations() {
        let factory = factory();
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.complete().unwrap();
        assert!(!uow.is_open());
        assert!(matches!(uow.new_entity("Item", None), Err(CoreError::UnitOfWorkClosed)));
        assert!(matches!(uow.get("Item", "x"), Err(CoreError::UnitOfWorkClosed)));
        assert!(matches!(uow.complete(), Err(CoreError::UnitOfWorkClosed)));
    }

    #[test]
    fn generated_identities_are_used() {
        let factory = factory().with_identity_generator(Arc::new(
            crate::entity::SequentialIdentityGenerator::new(),
        ));
        let mut uow = factory.new_unit_of_work().unwrap();
        let state = uow.new_entity("Item", None).unwrap();
        assert_eq!(state.reference().identity(), "item-1");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let factory = factory();
        let mut uow = factory.new_unit_of_work().unwrap();
        assert!(matches!(
            uow.new_entity("Ghost", None),
            Err(CoreError::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn callbacks_see_completion_once() {
        let factory = factory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.add_callback(Recorder(Arc::clone(&seen))).unwrap();
        uow.new_entity("Item", Some("a")).unwrap();
        uow.complete().unwrap();
        uow.discard();
        assert_eq!(*seen.lock(), vec![CompletionStatus::Completed]);
    }

    #[test]
    fn removed_callback_is_not_notified() {
        let factory = factory();
        let kept = Arc::new(Mutex::new(Vec::new()));
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.add_callback(Recorder(Arc::clone(&kept))).unwrap();
        let id = uow.add_callback(Recorder(Arc::clone(&dropped))).unwrap();

        assert!(uow.remove_callback(id).unwrap());
        assert!(!uow.remove_callback(id).unwrap());
        uow.complete().unwrap();

        assert_eq!(*kept.lock(), vec![CompletionStatus::Completed]);
        assert!(dropped.lock().is_empty());
        assert!(matches!(uow.remove_callback(id), Err(CoreError::UnitOfWorkClosed)));
    }

    #[test]
    fn vetoing_callback_discards() {
        let factory = factory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.add_callback(Veto).unwrap();
        uow.add_callback(Recorder(Arc::clone(&seen))).unwrap();
        uow.new_entity("Item", Some("a")).unwrap();

        let err = uow.complete().unwrap_err();
        assert!(matches!(err, CoreError::CompletionFailed { .. }));
        assert!(!uow.is_open());
        assert_eq!(*seen.lock(), vec![CompletionStatus::Discarded]);

        let mut check = factory.new_unit_of_work().unwrap();
        assert!(matches!(check.get("Item", "a"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn dropping_open_unit_of_work_discards() {
        let factory = factory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let mut uow = factory.new_unit_of_work().unwrap();
            uow.add_callback(Recorder(Arc::clone(&seen))).unwrap();
        }
        assert_eq!(*seen.lock(), vec![CompletionStatus::Discarded]);
    }

    #[test]
    fn dropping_silently_when_configured() {
        let factory = factory_with(Config::default().discard_on_drop(false));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let mut uow = factory.new_unit_of_work().unwrap();
            uow.add_callback(Recorder(Arc::clone(&seen))).unwrap();
        }
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn precheck_finds_stored_identity() {
        let factory = factory_with(Config::default().precheck_new_identity(true));
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.new_entity("Item", Some("a")).unwrap();
        uow.complete().unwrap();

        let mut uow = factory.new_unit_of_work().unwrap();
        assert!(matches!(
            uow.new_entity("Item", Some("a")),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn new_entity_removed_again_is_not_written() {
        let factory = factory();
        let mut uow = factory.new_unit_of_work().unwrap();
        let reference = uow.new_entity("Item", Some("a")).unwrap().reference().clone();
        uow.remove(&reference).unwrap();
        // The identity can be reused once the new entity is removed
        uow.new_entity("Item", Some("a")).unwrap();
        uow.remove(&reference).unwrap();
        uow.complete().unwrap();

        let mut check = factory.new_unit_of_work().unwrap();
        assert!(matches!(check.get("Item", "a"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn commit_time_is_the_unit_of_work_time() {
        let factory = factory();
        let time = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();
        let mut uow = factory
            .new_unit_of_work_at(Usecase::new("import"), time)
            .unwrap();
        assert_eq!(uow.usecase().name(), "import");
        uow.new_entity("Item", Some("a")).unwrap();
        uow.complete().unwrap();

        let mut check = factory.new_unit_of_work().unwrap();
        assert_eq!(check.get("Item", "a").unwrap().last_modified(), time);
    }
}
