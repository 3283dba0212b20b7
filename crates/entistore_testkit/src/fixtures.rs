//! Test fixtures and store helpers.
//!
//! Provides a sample entity model and stores over every bundled adapter,
//! cleaned up automatically.

use entistore_core::{
    Config, EntityDescriptor, EntityModel, MapEntityStore, UnitOfWorkFactory, ValueType,
};
use entistore_storage::{LogMapStore, LogStoreConfig, MemoryMapStore, StorageAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// The model used across the testkit.
///
/// - `Person`: `name`, `age`, `email`, `tags`, `status`; `manager`,
///   `friends`, `contacts`
/// - `Employee` extends `Person`: `salary`, `skills`
/// - `Counter`: `value`, defaulting to 0
pub fn sample_model() -> Arc<EntityModel> {
    let model = EntityModel::new()
        .with_type(
            EntityDescriptor::new("Person")
                .property("name", ValueType::Text)
                .property("age", ValueType::Integer)
                .property("email", ValueType::Text)
                .property("tags", ValueType::list(ValueType::Text))
                .property(
                    "status",
                    ValueType::enumeration("Status", ["active", "away", "gone"]),
                )
                .association("manager")
                .many_association("friends")
                .named_association("contacts"),
        )
        .and_then(|model| {
            model.with_type(
                EntityDescriptor::new("Employee")
                    .extends("Person")
                    .property("salary", ValueType::Float)
                    .property("skills", ValueType::map(ValueType::Text, ValueType::Integer)),
            )
        })
        .and_then(|model| {
            model.with_type(
                EntityDescriptor::new("Counter").property_with_default(
                    "value",
                    ValueType::Integer,
                    0,
                ),
            )
        })
        .expect("sample model is valid");
    Arc::new(model)
}

/// Which bundled adapter a [`TestStore`] runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// [`MemoryMapStore`].
    Memory,
    /// [`LogMapStore`] in a temporary directory.
    Log,
}

/// A unit of work factory over a fresh store, with automatic cleanup.
pub struct TestStore {
    /// The factory.
    pub factory: UnitOfWorkFactory,
    adapter: Arc<dyn StorageAdapter>,
    backend: Backend,
    config: Config,
    log_path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a store over [`MemoryMapStore`].
    pub fn memory() -> Self {
        Self::new(Backend::Memory, Config::default())
    }

    /// Creates a store over [`LogMapStore`].
    pub fn log() -> Self {
        Self::new(Backend::Log, Config::default())
    }

    /// Creates a store over `backend` with `config`.
    pub fn new(backend: Backend, config: Config) -> Self {
        match backend {
            Backend::Memory => {
                let adapter: Arc<dyn StorageAdapter> = Arc::new(MemoryMapStore::new());
                Self::assemble(adapter, backend, config, None, None)
            }
            Backend::Log => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let path = temp_dir.path().join("entities.log");
                let adapter = open_log(&path);
                Self::assemble(adapter, backend, config, Some(path), Some(temp_dir))
            }
        }
    }

    fn assemble(
        adapter: Arc<dyn StorageAdapter>,
        backend: Backend,
        config: Config,
        log_path: Option<PathBuf>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let model = sample_model();
        let store = MapEntityStore::new(Arc::clone(&adapter), Arc::clone(&model));
        Self {
            factory: UnitOfWorkFactory::new(Arc::new(store), model, config.clone()),
            adapter,
            backend,
            config,
            log_path,
            _temp_dir: temp_dir,
        }
    }

    /// Closes and reopens the store. A memory store keeps its adapter; a
    /// log store replays its file.
    pub fn reopen(self) -> Self {
        let Self {
            factory,
            adapter,
            backend,
            config,
            log_path,
            _temp_dir,
        } = self;
        drop(factory);
        let adapter = match &log_path {
            Some(path) => {
                drop(adapter);
                open_log(path)
            }
            None => adapter,
        };
        Self::assemble(adapter, backend, config, log_path, _temp_dir)
    }

    /// The adapter under the store.
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Which adapter this store runs on.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The log file, for log stores.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}

impl std::ops::Deref for TestStore {
    type Target = UnitOfWorkFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

fn open_log(path: &Path) -> Arc<dyn StorageAdapter> {
    let log = LogMapStore::open(path, LogStoreConfig::default().sync_on_commit(false))
        .expect("Failed to open log store");
    Arc::new(log)
}

/// Runs a test with a temporary memory store.
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    f(&TestStore::memory())
}

/// Runs a test with a temporary log store.
pub fn with_log_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    f(&TestStore::log())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Commits a person with the given identity and name.
    pub fn create_person(factory: &UnitOfWorkFactory, identity: &str, name: &str) {
        let mut uow = factory
            .new_unit_of_work()
            .expect("Failed to open unit of work");
        uow.new_entity("Person", Some(identity))
            .and_then(|person| person.set_property("name", name))
            .expect("Failed to create person");
        uow.complete().expect("Failed to complete");
    }

    /// Creates a store holding `count` people named `person-<i>`.
    pub fn populated_store(backend: Backend, count: usize) -> TestStore {
        let store = TestStore::new(backend, Config::default());
        let mut uow = store
            .new_unit_of_work()
            .expect("Failed to open unit of work");
        for i in 0..count {
            uow.new_entity("Person", Some(&format!("person-{i}")))
                .and_then(|person| person.set_property("age", i as i64))
                .expect("Failed to create person");
        }
        uow.complete().expect("Failed to complete");
        store
    }
}
