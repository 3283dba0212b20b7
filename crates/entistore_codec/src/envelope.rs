//! The backend-neutral entity envelope.
//!
//! An envelope is the form one entity takes when it crosses the storage
//! boundary:
//!
//! ```json
//! {
//!   "identity": "person-1",
//!   "type": "Person",
//!   "version": 3,
//!   "modified": 1700000000000,
//!   "properties": {"name": "Alice"},
//!   "associations": {"spouse": null},
//!   "manyAssociations": {"friends": ["person-2"]},
//!   "namedAssociations": {"roles": {"admin": "role-1"}}
//! }
//! ```
//!
//! The text form is JSON. The binary form is the same structure in CBOR.
//! Unknown keys are ignored and missing sections decode as empty, so
//! older envelopes stay readable when a type grows.

use crate::error::{CodecError, CodecResult};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// On-the-wire form of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeFormat {
    /// JSON text.
    #[default]
    Json,
    /// CBOR binary.
    Cbor,
}

impl EnvelopeFormat {
    /// Guesses the format of encoded bytes from their first byte.
    ///
    /// JSON envelopes start with `{` (after optional whitespace); CBOR
    /// envelopes start with a map header.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let first = *bytes.iter().find(|b| !b.is_ascii_whitespace())?;
        match first {
            b'{' => Some(Self::Json),
            0xa0..=0xbf => Some(Self::Cbor),
            _ => None,
        }
    }
}

/// Named references in insertion order, serialized as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamedRefs(pub Vec<(String, String)>);

impl Serialize for NamedRefs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, reference) in &self.0 {
            map.serialize_entry(name, reference)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NamedRefs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamedRefsVisitor;

        impl<'de> Visitor<'de> for NamedRefsVisitor {
            type Value = NamedRefs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of names to entity references")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NamedRefs, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, reference)) = access.next_entry::<String, String>()? {
                    entries.push((name, reference));
                }
                Ok(NamedRefs(entries))
            }
        }

        deserializer.deserialize_map(NamedRefsVisitor)
    }
}

/// Serialized state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Entity identity.
    pub identity: String,

    /// Entity type name.
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Committed version.
    #[serde(default)]
    pub version: u64,

    /// Last modification time, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub modified: i64,

    /// Encoded property values, in declaration order.
    #[serde(default)]
    pub properties: JsonMap<String, JsonValue>,

    /// Single associations; `None` when unset.
    #[serde(default)]
    pub associations: BTreeMap<String, Option<String>>,

    /// Ordered many-associations.
    #[serde(default)]
    pub many_associations: BTreeMap<String, Vec<String>>,

    /// Named associations, each in insertion order.
    #[serde(default)]
    pub named_associations: BTreeMap<String, NamedRefs>,
}

impl Envelope {
    /// Creates an empty envelope.
    pub fn new(identity: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            entity_type: entity_type.into(),
            version: 0,
            modified: 0,
            properties: JsonMap::new(),
            associations: BTreeMap::new(),
            many_associations: BTreeMap::new(),
            named_associations: BTreeMap::new(),
        }
    }

    /// Encodes to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CodecResult<String> {
        serde_json::to_string(self).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    /// Decodes from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid envelope.
    pub fn from_json(text: &str) -> CodecResult<Self> {
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_cbor(&self) -> CodecResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid envelope.
    pub fn from_cbor(bytes: &[u8]) -> CodecResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    /// Encodes in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, format: EnvelopeFormat) -> CodecResult<Vec<u8>> {
        match format {
            EnvelopeFormat::Json => {
                serde_json::to_vec(self).map_err(|e| CodecError::encoding_failed(e.to_string()))
            }
            EnvelopeFormat::Cbor => self.to_cbor(),
        }
    }

    /// Decodes bytes in either format.
    ///
    /// # Errors
    ///
    /// Returns an error if the format can't be recognized or the bytes are
    /// not a valid envelope.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        match EnvelopeFormat::detect(bytes) {
            Some(EnvelopeFormat::Json) => serde_json::from_slice(bytes)
                .map_err(|e| CodecError::decoding_failed(e.to_string())),
            Some(EnvelopeFormat::Cbor) => Self::from_cbor(bytes),
            None => Err(CodecError::decoding_failed("unrecognized envelope format")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Envelope {
        let mut envelope = Envelope::new("person-1", "Person");
        envelope.version = 3;
        envelope.modified = 1_700_000_000_000;
        envelope.properties.insert("name".into(), json!("Alice"));
        envelope.properties.insert("age".into(), json!(30));
        envelope.associations.insert("spouse".into(), None);
        envelope
            .many_associations
            .insert("friends".into(), vec!["person-3".into(), "person-2".into()]);
        envelope.named_associations.insert(
            "roles".into(),
            NamedRefs(vec![
                ("owner".into(), "role-9".into()),
                ("admin".into(), "role-1".into()),
            ]),
        );
        envelope
    }

    #[test]
    fn json_field_names() {
        let text = sample().to_json().unwrap();
        assert!(text.contains(r#""type":"Person""#));
        assert!(text.contains(r#""manyAssociations""#));
        assert!(text.contains(r#""namedAssociations":{"roles":{"owner":"role-9","admin":"role-1"}}"#));
        assert!(text.contains(r#""properties":{"name":"Alice","age":30}"#));
    }

    #[test]
    fn json_roundtrip() {
        let envelope = sample();
        let decoded = Envelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn cbor_roundtrip() {
        let envelope = sample();
        let decoded = Envelope::from_cbor(&envelope.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn decode_detects_format() {
        let envelope = sample();
        for format in [EnvelopeFormat::Json, EnvelopeFormat::Cbor] {
            let bytes = envelope.encode(format).unwrap();
            assert_eq!(EnvelopeFormat::detect(&bytes), Some(format));
            assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
        }
        assert!(Envelope::decode(b"garbage").is_err());
    }

    #[test]
    fn missing_sections_default_and_unknown_keys_ignored() {
        let text = r#"{"identity":"x","type":"Thing","extra":{"a":1}}"#;
        let envelope = Envelope::from_json(text).unwrap();
        assert_eq!(envelope.version, 0);
        assert!(envelope.properties.is_empty());
        assert!(envelope.associations.is_empty());
        assert!(envelope.many_associations.is_empty());
        assert!(envelope.named_associations.is_empty());
    }

    #[test]
    fn missing_identity_is_an_error() {
        let result = Envelope::from_json(r#"{"type":"Thing"}"#);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
