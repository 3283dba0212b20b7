//! # EntiStore Core
//!
//! Units of work with optimistic concurrency over pluggable storage.
//!
//! This crate provides:
//! - [`EntityState`] and the [`EntityModel`] of declared entity types
//! - [`EntityStateSerializer`] converting states to and from envelopes
//! - The EntityStore SPI ([`EntityStore`], [`EntityStoreTransaction`],
//!   [`StateCommitter`]) and [`MapEntityStore`] implementing it over any
//!   [`StorageAdapter`](entistore_storage::StorageAdapter)
//! - [`UnitOfWork`], its [`UnitOfWorkFactory`] and [`UnitOfWorkContext`]
//! - [`UnitOfWorkPolicy`] for propagation, retry and discard behavior
//!
//! ## Concurrency
//!
//! Every entity carries a version. Completing a unit of work checks that
//! each changed entity is still stored at the version it was loaded at
//! (and that new entities are still absent). If any check fails the whole
//! change set is rejected with [`CoreError::ConcurrentModification`], so
//! of two units of work racing on the same entity at most one wins.
//!
//! ## Example
//!
//! ```rust
//! use entistore_codec::{Value, ValueType};
//! use entistore_core::{Config, EntityDescriptor, EntityModel, MapEntityStore, UnitOfWorkFactory};
//! use entistore_storage::MemoryMapStore;
//! use std::sync::Arc;
//!
//! let model = Arc::new(
//!     EntityModel::new()
//!         .with_type(EntityDescriptor::new("Person").property("name", ValueType::Text))
//!         .unwrap(),
//! );
//! let store = MapEntityStore::new(Arc::new(MemoryMapStore::new()), Arc::clone(&model));
//! let factory = UnitOfWorkFactory::new(Arc::new(store), model, Config::default());
//!
//! let mut uow = factory.new_unit_of_work().unwrap();
//! uow.new_entity("Person", Some("alice")).unwrap().set_property("name", "Alice").unwrap();
//! uow.complete().unwrap();
//!
//! let mut uow = factory.new_unit_of_work().unwrap();
//! let alice = uow.get("Person", "alice").unwrap();
//! assert_eq!(alice.property("name"), Some(&Value::from("Alice")));
//! assert_eq!(alice.version(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod serializer;
mod store;
mod uow;
mod usecase;

pub use config::Config;
pub use entity::{
    EntityDescriptor, EntityModel, EntityState, EntityStatus, IdentityGenerator, NamedReferences,
    PropertyDescriptor, SequentialIdentityGenerator, UuidIdentityGenerator,
};
pub use error::{CoreError, CoreResult};
pub use serializer::EntityStateSerializer;
pub use store::{EntityStateStream, EntityStore, EntityStoreTransaction, MapEntityStore, StateCommitter};
pub use uow::{
    Attempt, CallbackId, CompletionStatus, DiscardPolicy, Propagation, RetryConfig, UnitOfWork,
    UnitOfWorkCallback, UnitOfWorkContext, UnitOfWorkFactory, UnitOfWorkPolicy, UnitOfWorkState,
};
pub use usecase::Usecase;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exported so callers need not depend on the lower crates directly
pub use entistore_codec::{Value, ValueType};
pub use entistore_storage::EntityReference;
