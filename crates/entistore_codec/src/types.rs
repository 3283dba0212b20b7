//! Declared property types.

use crate::value::Value;
use std::collections::HashSet;
use std::fmt;

/// The declared type of a property, deciding how its [`Value`] is encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Byte string, encoded as base64 text.
    Bytes,
    /// Enumeration with the given literals. The first literal is the default.
    Enum {
        /// Name of the enumeration.
        name: String,
        /// Declared literals.
        variants: Vec<String>,
    },
    /// Ordered list of one element type.
    List(Box<ValueType>),
    /// Ordered map from key type to value type.
    Map {
        /// Key type.
        key: Box<ValueType>,
        /// Value type.
        value: Box<ValueType>,
    },
    /// Nested structured value with typed fields.
    Composite {
        /// Name of the composite type.
        name: String,
        /// Field names and types, in declaration order.
        fields: Vec<(String, ValueType)>,
    },
    /// Type handled by a codec registered under this name.
    Custom(String),
}

impl ValueType {
    /// A list of `element`.
    #[must_use]
    pub fn list(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    /// A map from `key` to `value`.
    #[must_use]
    pub fn map(key: ValueType, value: ValueType) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// An enumeration with the given literals.
    #[must_use]
    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::Enum {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// A composite with the given fields.
    #[must_use]
    pub fn composite<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (S, ValueType)>,
    ) -> Self {
        Self::Composite {
            name: name.into(),
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// The value a property of this type starts with.
    ///
    /// Custom types default to [`Value::Null`]; use
    /// [`CodecRegistry::default_for`](crate::CodecRegistry::default_for) to
    /// ask their codec instead.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Integer => Value::Integer(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Bytes => Value::Bytes(Vec::new()),
            ValueType::Enum { variants, .. } => variants
                .first()
                .map_or(Value::Null, |v| Value::Enum(v.clone())),
            ValueType::List(_) => Value::List(Vec::new()),
            ValueType::Map { .. } => Value::Map(Vec::new()),
            ValueType::Composite { fields, .. } => Value::Composite(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.default_value()))
                    .collect(),
            ),
            ValueType::Custom(_) => Value::Null,
        }
    }
    /// Whether `value` has the shape this type encodes.
    ///
    /// Null fits every type. Custom types accept any value here; their
    /// codec has the final word when the value is encoded. Text-keyed maps
    /// must not repeat a key.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ValueType::Custom(_), _) => true,
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Integer, Value::Integer(_))
            | (ValueType::Float, Value::Float(_) | Value::Integer(_))
            | (ValueType::Text, Value::Text(_))
            | (ValueType::Bytes, Value::Bytes(_)) => true,
            (ValueType::Enum { variants, .. }, Value::Enum(literal)) => {
                variants.is_empty() || variants.contains(literal)
            }
            (ValueType::List(element), Value::List(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (ValueType::Map { key, value }, Value::Map(pairs)) if **key == ValueType::Text => {
                let mut seen = HashSet::with_capacity(pairs.len());
                pairs.iter().all(|(k, v)| {
                    k.as_text().is_some_and(|k| seen.insert(k)) && value.accepts(v)
                })
            }
            (ValueType::Map { key, value }, Value::Map(pairs)) => pairs
                .iter()
                .all(|(k, v)| key.accepts(k) && value.accepts(v)),
            (ValueType::Composite { fields, .. }, Value::Composite(values)) => {
                values.iter().all(|(name, v)| {
                    fields
                        .iter()
                        .find(|(field, _)| field == name)
                        .is_some_and(|(_, ty)| ty.accepts(v))
                })
            }
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Float => f.write_str("float"),
            ValueType::Text => f.write_str("text"),
            ValueType::Bytes => f.write_str("bytes"),
            ValueType::Enum { name, .. } => write!(f, "enum {name}"),
            ValueType::List(element) => write!(f, "list<{element}>"),
            ValueType::Map { key, value } => write!(f, "map<{key}, {value}>"),
            ValueType::Composite { name, .. } => write!(f, "composite {name}"),
            ValueType::Custom(name) => write!(f, "custom {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_defaults() {
        assert_eq!(ValueType::Bool.default_value(), Value::Bool(false));
        assert_eq!(ValueType::Integer.default_value(), Value::Integer(0));
        assert_eq!(ValueType::Text.default_value(), Value::Text(String::new()));
        assert_eq!(ValueType::list(ValueType::Integer).default_value(), Value::List(vec![]));
    }

    #[test]
    fn enum_defaults_to_first_literal() {
        let color = ValueType::enumeration("Color", ["RED", "GREEN"]);
        assert_eq!(color.default_value(), Value::Enum("RED".into()));
        let empty = ValueType::enumeration("Empty", Vec::<String>::new());
        assert_eq!(empty.default_value(), Value::Null);
    }

    #[test]
    fn composite_defaults_every_field() {
        let address = ValueType::composite(
            "Address",
            [("street", ValueType::Text), ("zip", ValueType::Integer)],
        );
        let default = address.default_value();
        assert_eq!(default.get("street"), Some(&Value::Text(String::new())));
        assert_eq!(default.get("zip"), Some(&Value::Integer(0)));
    }

    #[test]
    fn accepts_checks_shape() {
        assert!(ValueType::Integer.accepts(&Value::Integer(3)));
        assert!(ValueType::Integer.accepts(&Value::Null));
        assert!(!ValueType::Integer.accepts(&Value::Text("oops".into())));
        assert!(ValueType::Float.accepts(&Value::Integer(3)));
        assert!(ValueType::Custom("Money".into()).accepts(&Value::Text("1 EUR".into())));

        let tags = ValueType::list(ValueType::Text);
        assert!(tags.accepts(&Value::List(vec!["a".into(), "b".into()])));
        assert!(!tags.accepts(&Value::List(vec!["a".into(), Value::Integer(1)])));

        let color = ValueType::enumeration("Color", ["RED", "GREEN"]);
        assert!(color.accepts(&Value::Enum("RED".into())));
        assert!(!color.accepts(&Value::Enum("BLUE".into())));
    }

    #[test]
    fn accepts_rejects_repeated_text_keys() {
        let scores = ValueType::map(ValueType::Text, ValueType::Integer);
        let unique = Value::Map(vec![("a".into(), Value::Integer(1)), ("b".into(), Value::Integer(2))]);
        let repeated =
            Value::Map(vec![("a".into(), Value::Integer(1)), ("a".into(), Value::Integer(2))]);
        assert!(scores.accepts(&unique));
        assert!(!scores.accepts(&repeated));
        assert!(!scores.accepts(&Value::Map(vec![(Value::Null, Value::Integer(1))])));
    }

    #[test]
    fn accepts_only_declared_composite_fields() {
        let address = ValueType::composite("Address", [("zip", ValueType::Integer)]);
        assert!(address.accepts(&Value::composite([("zip", Value::Integer(1))])));
        assert!(!address.accepts(&Value::composite([("zip", Value::Text("x".into()))])));
        assert!(!address.accepts(&Value::composite([("city", Value::Text("x".into()))])));
    }

    #[test]
    fn display_names() {
        let ty = ValueType::map(ValueType::Text, ValueType::list(ValueType::Float));
        assert_eq!(ty.to_string(), "map<text, list<float>>");
    }
}
