//! Error types for storage operations.

use crate::reference::EntityReference;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No entry is stored under the reference.
    #[error("entity not found: {reference}")]
    NotFound {
        /// The reference that was looked up.
        reference: EntityReference,
    },

    /// A new entity was written under a reference that is already stored.
    #[error("entity already exists: {reference}")]
    AlreadyExists {
        /// The reference that already exists.
        reference: EntityReference,
    },

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store's lock file.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// A change set listed the same reference more than once.
    #[error("duplicate change for entity {reference}")]
    DuplicateChange {
        /// The reference that appeared twice.
        reference: EntityReference,
    },
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(reference: &EntityReference) -> Self {
        Self::NotFound {
            reference: reference.clone(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(reference: &EntityReference) -> Self {
        Self::AlreadyExists {
            reference: reference.clone(),
        }
    }

    /// Returns `true` if this error reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
