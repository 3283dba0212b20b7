//! Property-based test generators using proptest.
//!
//! Provides strategies for values of a declared type and for whole entity
//! states that round-trip through the serializer.

use entistore_core::{EntityDescriptor, EntityReference, EntityState, Value, ValueType};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for entity identities.
pub fn identity_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for entity references.
pub fn reference_strategy() -> impl Strategy<Value = EntityReference> {
    identity_strategy().prop_map(EntityReference::new)
}

/// Strategy for values of `value_type`.
///
/// Floats are multiples of 1/8 so their text form parses back exactly.
/// Custom types only produce null.
pub fn value_strategy(value_type: &ValueType) -> BoxedStrategy<Value> {
    match value_type {
        ValueType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        ValueType::Float => (-8_000_000i32..8_000_000)
            .prop_map(|n| Value::Float(f64::from(n) / 8.0))
            .boxed(),
        ValueType::Text => ".{0,16}".prop_map(Value::Text).boxed(),
        ValueType::Bytes => prop::collection::vec(any::<u8>(), 0..32)
            .prop_map(Value::Bytes)
            .boxed(),
        ValueType::Enum { variants, .. } if !variants.is_empty() => {
            prop::sample::select(variants.clone())
                .prop_map(Value::Enum)
                .boxed()
        }
        ValueType::List(element) => prop::collection::vec(value_strategy(element), 0..4)
            .prop_map(Value::List)
            .boxed(),
        ValueType::Map { key, value } => {
            prop::collection::vec((value_strategy(key), value_strategy(value)), 0..4)
                .prop_map(Value::map)
                .boxed()
        }
        ValueType::Composite { fields, .. } => {
            let fields: Vec<BoxedStrategy<(String, Value)>> = fields
                .iter()
                .map(|(name, field_type)| {
                    let name = name.clone();
                    value_strategy(field_type)
                        .prop_map(move |v| (name.clone(), v))
                        .boxed()
                })
                .collect();
            fields.prop_map(|fields| Value::composite(fields)).boxed()
        }
        ValueType::Enum { .. } | ValueType::Custom(_) => Just(Value::Null).boxed(),
    }
}

/// Strategy for new entity states of `descriptor`, with every declared
/// property and association filled.
pub fn entity_state_strategy(descriptor: Arc<EntityDescriptor>) -> BoxedStrategy<EntityState> {
    let properties: Vec<BoxedStrategy<(String, Value)>> = descriptor
        .properties()
        .iter()
        .map(|p| {
            let name = p.name().to_string();
            value_strategy(p.value_type())
                .prop_map(move |v| (name.clone(), v))
                .boxed()
        })
        .collect();
    let associations: Vec<BoxedStrategy<(String, Option<EntityReference>)>> = descriptor
        .associations()
        .iter()
        .map(|name| {
            let name = name.clone();
            prop::option::of(reference_strategy())
                .prop_map(move |r| (name.clone(), r))
                .boxed()
        })
        .collect();
    let many: Vec<BoxedStrategy<(String, Vec<EntityReference>)>> = descriptor
        .many_associations()
        .iter()
        .map(|name| {
            let name = name.clone();
            prop::collection::vec(reference_strategy(), 0..6)
                .prop_map(move |refs| (name.clone(), refs))
                .boxed()
        })
        .collect();
    let named: Vec<BoxedStrategy<(String, Vec<(String, EntityReference)>)>> = descriptor
        .named_associations()
        .iter()
        .map(|name| {
            let name = name.clone();
            prop::collection::vec(("[a-z]{1,8}", reference_strategy()), 0..6)
                .prop_map(move |entries| (name.clone(), entries))
                .boxed()
        })
        .collect();

    (reference_strategy(), properties, associations, many, named)
        .prop_map(move |(reference, properties, associations, many, named)| {
            let mut state = EntityState::new(reference, Arc::clone(&descriptor));
            for (name, value) in properties {
                state
                    .set_property(&name, value)
                    .expect("Generated property is declared");
            }
            for (name, target) in associations {
                state
                    .set_association(&name, target)
                    .expect("Generated association is declared");
            }
            for (name, references) in many {
                for (i, reference) in references.into_iter().enumerate() {
                    state
                        .add_many_association(&name, i, reference)
                        .expect("Generated many-association is declared");
                }
            }
            for (name, entries) in named {
                for (key, reference) in entries {
                    state
                        .put_named_association(&name, key, reference)
                        .expect("Generated named association is declared");
                }
            }
            state
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_model;
    use entistore_core::EntityStateSerializer;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn identities_parse(id in identity_strategy()) {
            prop_assert!(EntityReference::parse(&id).is_some());
        }

        #[test]
        fn enum_values_are_declared(value in value_strategy(&ValueType::enumeration("E", ["a", "b"]))) {
            prop_assert!(matches!(value.as_enum(), Some("a" | "b")));
        }

        #[test]
        fn generated_states_roundtrip(
            state in entity_state_strategy(Arc::clone(sample_model().descriptor("Employee").unwrap()))
        ) {
            let serializer = EntityStateSerializer::new(sample_model());
            let decoded = serializer.decode(&serializer.encode(&state).unwrap()).unwrap();
            prop_assert_eq!(decoded, state);
        }
    }
}
