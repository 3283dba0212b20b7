//! Error types for EntiStore core.

use entistore_storage::EntityReference;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EntiStore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No entity with this reference exists.
    #[error("entity not found: {reference}")]
    NotFound {
        /// The reference that was looked up.
        reference: EntityReference,
    },

    /// An entity with this reference already exists.
    #[error("entity already exists: {reference}")]
    AlreadyExists {
        /// The conflicting reference.
        reference: EntityReference,
    },

    /// The stored entity is not of the requested type.
    #[error("entity {reference} is a {found}, not a {expected}")]
    TypeMismatch {
        /// The entity that was loaded.
        reference: EntityReference,
        /// The requested type.
        expected: String,
        /// The stored type.
        found: String,
    },

    /// The entity type is not registered in the model.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// Name of the type.
        name: String,
    },

    /// Other writers changed entities this unit of work was about to write.
    #[error("concurrent modification of {}", join_references(.references))]
    ConcurrentModification {
        /// Every conflicting reference.
        references: Vec<EntityReference>,
    },

    /// Storage backend error.
    #[error("backend fault: {0}")]
    BackendFault(#[from] entistore_storage::StorageError),

    /// Serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] entistore_codec::CodecError),

    /// Completing a unit of work failed; it has been discarded.
    #[error("unit of work completion failed: {source}")]
    CompletionFailed {
        /// The underlying cause.
        source: Box<CoreError>,
    },

    /// Mutation of an entity that was removed.
    #[error("entity {reference} has been removed")]
    EntityRemoved {
        /// The removed entity.
        reference: EntityReference,
    },

    /// Use of a unit of work after it completed or was discarded.
    #[error("unit of work is closed")]
    UnitOfWorkClosed,

    /// Use of a paused unit of work.
    #[error("unit of work is paused")]
    UnitOfWorkPaused,

    /// An operation required a current unit of work and there is none.
    #[error("no current unit of work")]
    NoCurrentUnitOfWork,

    /// Resuming a unit of work while another one is current.
    #[error("another unit of work is current in this context")]
    ContextOccupied,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

fn join_references(references: &[EntityReference]) -> String {
    references
        .iter()
        .map(EntityReference::identity)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(reference: &EntityReference) -> Self {
        Self::NotFound {
            reference: reference.clone(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(reference: &EntityReference) -> Self {
        Self::AlreadyExists {
            reference: reference.clone(),
        }
    }

    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps a cause into a completion failure.
    pub fn completion_failed(source: CoreError) -> Self {
        Self::CompletionFailed {
            source: Box::new(source),
        }
    }

    /// Returns true for a concurrent modification, directly or as the cause
    /// of a failed completion.
    #[must_use]
    pub fn is_concurrent_modification(&self) -> bool {
        match self {
            Self::ConcurrentModification { .. } => true,
            Self::CompletionFailed { source } => source.is_concurrent_modification(),
            _ => false,
        }
    }

    /// Returns true for errors caused by misuse of the API.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::EntityRemoved { .. }
                | Self::UnitOfWorkClosed
                | Self::UnitOfWorkPaused
                | Self::NoCurrentUnitOfWork
                | Self::ContextOccupied
                | Self::InvalidOperation { .. }
        )
    }

    /// The references named by a concurrent modification, looking through
    /// a failed completion. Empty for every other error.
    #[must_use]
    pub fn conflicting_references(&self) -> &[EntityReference] {
        match self {
            Self::ConcurrentModification { references } => references,
            Self::CompletionFailed { source } => source.conflicting_references(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entistore_storage::StorageError;

    #[test]
    fn conflict_is_seen_through_completion_failure() {
        let conflict = CoreError::ConcurrentModification {
            references: vec![EntityReference::new("a"), EntityReference::new("b")],
        };
        assert_eq!(conflict.to_string(), "concurrent modification of a, b");

        let wrapped = CoreError::completion_failed(conflict);
        assert!(wrapped.is_concurrent_modification());
        assert_eq!(wrapped.conflicting_references().len(), 2);
    }

    #[test]
    fn backend_faults_are_not_conflicts() {
        let fault: CoreError = StorageError::Locked.into();
        assert!(!fault.is_concurrent_modification());
        assert!(!fault.is_programming_error());
        assert!(CoreError::completion_failed(fault).conflicting_references().is_empty());
    }

    #[test]
    fn programming_errors() {
        assert!(CoreError::UnitOfWorkClosed.is_programming_error());
        assert!(CoreError::ContextOccupied.is_programming_error());
        assert!(CoreError::EntityRemoved {
            reference: EntityReference::new("x")
        }
        .is_programming_error());
        assert!(!CoreError::not_found(&EntityReference::new("x")).is_programming_error());
    }
}
