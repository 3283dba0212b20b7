//! Conversion between [`EntityState`] and the serialized [`Envelope`].

use crate::entity::{EntityModel, EntityState, NamedReferences};
use crate::error::CoreResult;
use chrono::{DateTime, TimeZone, Utc};
use entistore_codec::{CodecError, Envelope, EnvelopeFormat, NamedRefs};
use entistore_storage::EntityReference;
use std::sync::Arc;

/// Encodes entity states to envelope bytes and back, using the entity
/// model for property types and defaults.
///
/// Encoding writes properties in descriptor order. Decoding gives loaded
/// states; declared properties or associations missing from the envelope
/// keep their defaults and undeclared keys are ignored.
#[derive(Debug, Clone)]
pub struct EntityStateSerializer {
    model: Arc<EntityModel>,
    format: EnvelopeFormat,
}

impl EntityStateSerializer {
    /// Creates a serializer writing JSON envelopes.
    #[must_use]
    pub fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            format: EnvelopeFormat::Json,
        }
    }

    /// Sets the format new envelopes are written in. Both formats are
    /// always readable.
    #[must_use]
    pub fn with_format(mut self, format: EnvelopeFormat) -> Self {
        self.format = format;
        self
    }

    /// The entity model.
    #[must_use]
    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    /// The format new envelopes are written in.
    #[must_use]
    pub fn format(&self) -> EnvelopeFormat {
        self.format
    }

    /// Builds the envelope for `state`, stamped with `version` and
    /// `modified` instead of the state's own.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a property value does not fit its type.
    pub fn to_envelope(
        &self,
        state: &EntityState,
        version: u64,
        modified: DateTime<Utc>,
    ) -> CoreResult<Envelope> {
        let codecs = self.model.codecs();
        let mut envelope = Envelope::new(state.reference().identity(), state.entity_type());
        envelope.version = version;
        envelope.modified = modified.timestamp_millis();

        for property in state.descriptor().properties() {
            let default;
            let value = match state.property(property.name()) {
                Some(value) => value,
                None => {
                    default = property.default_value();
                    &default
                }
            };
            let json = codecs.encode_value(value, property.value_type())?;
            envelope.properties.insert(property.name().to_string(), json);
        }
        for (name, target) in state.associations() {
            envelope
                .associations
                .insert(name.to_string(), target.map(|r| r.identity().to_string()));
        }
        for (name, references) in state.many_associations() {
            envelope.many_associations.insert(
                name.to_string(),
                references.iter().map(|r| r.identity().to_string()).collect(),
            );
        }
        for (name, named) in state.named_associations() {
            envelope.named_associations.insert(
                name.to_string(),
                NamedRefs(
                    named
                        .iter()
                        .map(|(key, r)| (key.to_string(), r.identity().to_string()))
                        .collect(),
                ),
            );
        }
        Ok(envelope)
    }

    /// Rebuilds a loaded state from an envelope.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` for an unregistered type, or a codec
    /// error for malformed data.
    pub fn from_envelope(&self, envelope: &Envelope) -> CoreResult<EntityState> {
        let descriptor = self.model.descriptor(&envelope.entity_type)?.clone();
        let reference = EntityReference::parse(&envelope.identity)
            .ok_or_else(|| CodecError::decoding_failed("envelope has a blank identity"))?;
        let modified = Utc
            .timestamp_millis_opt(envelope.modified)
            .single()
            .ok_or_else(|| {
                CodecError::decoding_failed(format!("invalid timestamp {}", envelope.modified))
            })?;

        let mut state =
            EntityState::loaded(reference, descriptor.clone(), envelope.version, modified);
        let codecs = self.model.codecs();

        for property in descriptor.properties() {
            if let Some(json) = envelope.properties.get(property.name()) {
                let value = codecs.decode_value(json, property.value_type())?;
                state.load_property(property.name(), value);
            }
        }
        for name in descriptor.associations() {
            if let Some(target) = envelope.associations.get(name) {
                state.load_association(name, target.as_deref().map(EntityReference::new));
            }
        }
        for name in descriptor.many_associations() {
            if let Some(references) = envelope.many_associations.get(name) {
                state.load_many_association(
                    name,
                    references.iter().map(EntityReference::new).collect(),
                );
            }
        }
        for name in descriptor.named_associations() {
            if let Some(NamedRefs(entries)) = envelope.named_associations.get(name) {
                let named: NamedReferences = entries
                    .iter()
                    .map(|(key, r)| (key.clone(), EntityReference::new(r)))
                    .collect();
                state.load_named_association(name, named);
            }
        }
        Ok(state)
    }

    /// Encodes `state` with its own version and modification time.
    ///
    /// # Errors
    ///
    /// Returns a codec error if encoding fails.
    pub fn encode(&self, state: &EntityState) -> CoreResult<Vec<u8>> {
        self.encode_as(state, state.version(), state.last_modified())
    }

    /// Encodes `state` stamped with the given version and time.
    ///
    /// # Errors
    ///
    /// Returns a codec error if encoding fails.
    pub fn encode_as(
        &self,
        state: &EntityState,
        version: u64,
        modified: DateTime<Utc>,
    ) -> CoreResult<Vec<u8>> {
        Ok(self.to_envelope(state, version, modified)?.encode(self.format)?)
    }

    /// Decodes bytes in either envelope format.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid envelope for a
    /// registered type.
    pub fn decode(&self, bytes: &[u8]) -> CoreResult<EntityState> {
        self.from_envelope(&Envelope::decode(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDescriptor;
    use crate::error::CoreError;
    use entistore_codec::{Value, ValueType};

    fn model() -> Arc<EntityModel> {
        Arc::new(
            EntityModel::new()
                .with_type(
                    EntityDescriptor::new("Person")
                        .property("name", ValueType::Text)
                        .property_with_default("nickname", ValueType::Text, "none")
                        .property("tags", ValueType::list(ValueType::Text))
                        .association("spouse")
                        .many_association("friends")
                        .named_association("roles"),
                )
                .unwrap(),
        )
    }

    fn sample(model: &EntityModel) -> EntityState {
        let descriptor = model.descriptor("Person").unwrap().clone();
        let mut state = EntityState::new(EntityReference::new("p1"), descriptor);
        state.set_property("name", "Alice").unwrap();
        state
            .set_property("tags", Value::List(vec!["x".into(), "y".into()]))
            .unwrap();
        state
            .set_association("spouse", Some(EntityReference::new("p2")))
            .unwrap();
        for id in ["p4", "p3"] {
            state
                .add_many_association("friends", usize::MAX, EntityReference::new(id))
                .unwrap();
        }
        state
            .put_named_association("roles", "owner", EntityReference::new("r2"))
            .unwrap();
        state
            .put_named_association("roles", "admin", EntityReference::new("r1"))
            .unwrap();
        state
    }

    #[test]
    fn roundtrip_json_and_cbor() {
        let model = model();
        let state = sample(&model);
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        for format in [EnvelopeFormat::Json, EnvelopeFormat::Cbor] {
            let serializer = EntityStateSerializer::new(model.clone()).with_format(format);
            let bytes = serializer.encode_as(&state, 7, now).unwrap();
            let decoded = serializer.decode(&bytes).unwrap();
            assert_eq!(decoded.version(), 7);
            assert_eq!(decoded.last_modified(), now);
            assert_eq!(decoded.property("name"), state.property("name"));
            assert_eq!(decoded.many_association("friends"), state.many_association("friends"));
            assert_eq!(decoded.named_association("roles"), state.named_association("roles"));
            assert_eq!(decoded.association("spouse"), state.association("spouse"));
        }
    }

    #[test]
    fn missing_keys_take_declared_defaults() {
        let serializer = EntityStateSerializer::new(model());
        let old = br#"{"identity":"p9","type":"Person","version":2,"properties":{"name":"Old"}}"#;
        let state = serializer.decode(old).unwrap();
        assert_eq!(state.property("name"), Some(&Value::from("Old")));
        assert_eq!(state.property("nickname"), Some(&Value::from("none")));
        assert_eq!(state.property("tags"), Some(&Value::List(vec![])));
        assert!(state.many_association("friends").is_empty());
        assert_eq!(state.association("spouse"), None);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let serializer = EntityStateSerializer::new(model());
        let result = serializer.decode(br#"{"identity":"x","type":"Ghost"}"#);
        assert!(matches!(result, Err(CoreError::UnknownEntityType { .. })));
    }

    #[test]
    fn undeclared_envelope_keys_are_ignored() {
        let serializer = EntityStateSerializer::new(model());
        let text = br#"{"identity":"p1","type":"Person","properties":{"shoeSize":44},"associations":{"boss":"p7"}}"#;
        let state = serializer.decode(text).unwrap();
        assert_eq!(state.property("shoeSize"), None);
        assert_eq!(state.association("boss"), None);
    }
}
