//! # EntiStore Codec
//!
//! Property values and the serialization envelope for EntiStore.
//!
//! Every entity that crosses the storage boundary is converted to an
//! [`Envelope`]: identity, type, version, modification time, and its
//! properties and associations. Property values are encoded according to
//! their declared [`ValueType`], with [`CodecRegistry`] handling custom
//! types through [`ValueCodec`] implementations.
//!
//! ## Usage
//!
//! ```
//! use entistore_codec::{CodecRegistry, Envelope, Value, ValueType};
//!
//! let registry = CodecRegistry::new();
//! let mut envelope = Envelope::new("person-1", "Person");
//! let name = registry.encode_value(&Value::from("Alice"), &ValueType::Text).unwrap();
//! envelope.properties.insert("name".to_string(), name);
//!
//! let text = envelope.to_json().unwrap();
//! let decoded = Envelope::from_json(&text).unwrap();
//! assert_eq!(decoded, envelope);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod registry;
mod types;
mod value;

pub use envelope::{Envelope, EnvelopeFormat, NamedRefs};
pub use error::{CodecError, CodecResult};
pub use registry::{CodecRegistry, ValueCodec};
pub use types::ValueType;
pub use value::Value;

/// Re-exported so custom [`ValueCodec`]s can name the JSON type.
pub use serde_json::Value as JsonValue;
