//! # EntiStore Storage
//!
//! Entity references and the narrow storage adapter contract for EntiStore.
//!
//! Storage adapters are **opaque key-value stores**. They map an
//! [`EntityReference`] to the serialized bytes of one entity and never look
//! inside those bytes. Version checks, serialization and change tracking all
//! happen above this crate.
//!
//! ## Design Principles
//!
//! - Adapters only provide get / apply-changes / scan
//! - A change set is applied all-or-nothing
//! - Adapters must be `Send + Sync` for concurrent access
//!
//! ## Available Adapters
//!
//! - [`MemoryMapStore`] - For testing and ephemeral storage
//! - [`LogMapStore`] - Append-only log file with compaction
//!
//! ## Example
//!
//! ```rust
//! use entistore_storage::{ChangeBuffer, EntityReference, MemoryMapStore, StorageAdapter};
//!
//! let store = MemoryMapStore::new();
//! let reference = EntityReference::new("person-1");
//!
//! let mut changes = ChangeBuffer::new();
//! changes.new_entity(reference.clone(), "Person", b"{}".to_vec());
//! store.apply_changes(&changes).unwrap();
//!
//! assert_eq!(store.get(&reference).unwrap(), b"{}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod log;
mod memory;
mod reference;

pub use adapter::{
    ChangeBuffer, ChangeKind, CommitLock, EntityScan, EntityWriter, MapChanger, MapChanges,
    StagedChange, StorageAdapter,
};
pub use error::{StorageError, StorageResult};
pub use log::{CompactionStats, LogMapStore, LogStoreConfig, LogStoreStats};
pub use memory::MemoryMapStore;
pub use reference::EntityReference;
