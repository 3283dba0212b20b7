//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode an envelope or value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode an envelope or value.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// A value does not match its declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The declared type.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// No codec is registered for a custom type.
    #[error("no codec registered for type '{type_name}'")]
    UnknownCodec {
        /// Name of the custom type.
        type_name: String,
    },

    /// An enumeration literal that the enum does not declare.
    #[error("'{variant}' is not a variant of enum '{enum_name}'")]
    InvalidEnumVariant {
        /// Name of the enumeration.
        enum_name: String,
        /// The unknown literal.
        variant: String,
    },

    /// Invalid base64 in an encoded byte string.
    #[error("invalid base64: {message}")]
    InvalidBase64 {
        /// Description of the base64 error.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unknown codec error.
    pub fn unknown_codec(type_name: impl Into<String>) -> Self {
        Self::UnknownCodec {
            type_name: type_name.into(),
        }
    }
}
