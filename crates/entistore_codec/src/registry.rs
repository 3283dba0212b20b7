//! Typed conversion between [`Value`] and JSON, with pluggable codecs.

use crate::error::{CodecError, CodecResult};
use crate::types::ValueType;
use crate::value::Value;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Encodes and decodes values of one custom type.
///
/// Register implementations with [`CodecRegistry::register`] and refer to
/// them through [`ValueType::Custom`].
pub trait ValueCodec: Send + Sync {
    /// Name the codec is registered under.
    fn type_name(&self) -> &str;

    /// Encodes a value to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has the wrong shape.
    fn encode(&self, value: &Value) -> CodecResult<JsonValue>;

    /// Decodes a value from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON has the wrong shape.
    fn decode(&self, json: &JsonValue) -> CodecResult<Value>;

    /// Value used when a property of this type is missing.
    fn default_value(&self) -> Value {
        Value::Null
    }
}

/// Per-type value conversion, guided by [`ValueType`].
///
/// Built-in types are handled directly. [`ValueType::Custom`] types are
/// looked up among the registered [`ValueCodec`]s.
///
/// | type | JSON form |
/// |------|-----------|
/// | bool / integer / text | native |
/// | float | number, or `"NaN"` / `"Infinity"` / `"-Infinity"` |
/// | bytes | base64 string |
/// | enum | literal name |
/// | list | array |
/// | map with text keys | object |
/// | other map | array of `{"key": .., "value": ..}` |
/// | composite | object of fields |
///
/// `null` is accepted for every type.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ValueCodec>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}

impl CodecRegistry {
    /// Creates a registry with no custom codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec, replacing any codec with the same name.
    pub fn register(&mut self, codec: impl ValueCodec + 'static) {
        self.codecs
            .insert(codec.type_name().to_string(), Arc::new(codec));
    }

    /// Returns whether a codec is registered under `type_name`.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    fn codec(&self, type_name: &str) -> CodecResult<&Arc<dyn ValueCodec>> {
        self.codecs
            .get(type_name)
            .ok_or_else(|| CodecError::unknown_codec(type_name))
    }

    /// The value a missing property of type `ty` decodes to.
    pub fn default_for(&self, ty: &ValueType) -> Value {
        match ty {
            ValueType::Custom(name) => self
                .codecs
                .get(name)
                .map_or(Value::Null, |codec| codec.default_value()),
            ValueType::Composite { fields, .. } => Value::Composite(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.default_for(field)))
                    .collect(),
            ),
            other => other.default_value(),
        }
    }

    /// Encodes `value` as type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] when the value doesn't fit the
    /// type, or [`CodecError::UnknownCodec`] for an unregistered custom type.
    pub fn encode_value(&self, value: &Value, ty: &ValueType) -> CodecResult<JsonValue> {
        match (ty, value) {
            (_, Value::Null) => Ok(JsonValue::Null),
            (ValueType::Custom(name), _) => self.codec(name)?.encode(value),
            (ValueType::Bool, Value::Bool(b)) => Ok(JsonValue::Bool(*b)),
            (ValueType::Integer, Value::Integer(n)) => Ok(JsonValue::from(*n)),
            (ValueType::Float, Value::Float(f)) => Ok(float_to_json(*f)),
            (ValueType::Float, Value::Integer(n)) => Ok(JsonValue::from(*n)),
            (ValueType::Text, Value::Text(s)) => Ok(JsonValue::String(s.clone())),
            (ValueType::Bytes, Value::Bytes(b)) => Ok(JsonValue::String(BASE64.encode(b))),
            (ValueType::Enum { name, variants }, Value::Enum(literal)) => {
                check_variant(name, variants, literal)?;
                Ok(JsonValue::String(literal.clone()))
            }
            (ValueType::List(element), Value::List(items)) => items
                .iter()
                .map(|item| self.encode_value(item, element))
                .collect::<CodecResult<Vec<_>>>()
                .map(JsonValue::Array),
            (ValueType::Map { key, value: vt }, Value::Map(pairs)) => {
                if **key == ValueType::Text {
                    let mut object = JsonMap::with_capacity(pairs.len());
                    for (k, v) in pairs {
                        let k = k
                            .as_text()
                            .ok_or_else(|| CodecError::type_mismatch("text", k.kind()))?;
                        if object.insert(k.to_string(), self.encode_value(v, vt)?).is_some() {
                            return Err(CodecError::encoding_failed(format!(
                                "duplicate map key '{k}'"
                            )));
                        }
                    }
                    Ok(JsonValue::Object(object))
                } else {
                    pairs
                        .iter()
                        .map(|(k, v)| {
                            let mut entry = JsonMap::with_capacity(2);
                            entry.insert("key".into(), self.encode_value(k, key)?);
                            entry.insert("value".into(), self.encode_value(v, vt)?);
                            Ok(JsonValue::Object(entry))
                        })
                        .collect::<CodecResult<Vec<_>>>()
                        .map(JsonValue::Array)
                }
            }
            (ValueType::Composite { fields, .. }, Value::Composite(values)) => {
                let mut object = JsonMap::with_capacity(fields.len());
                for (name, field) in fields {
                    if let Some(v) = values.get(name) {
                        object.insert(name.clone(), self.encode_value(v, field)?);
                    }
                }
                Ok(JsonValue::Object(object))
            }
            (ty, value) => Err(CodecError::type_mismatch(ty.to_string(), value.kind())),
        }
    }

    /// Decodes JSON as type `ty`.
    ///
    /// Composite fields missing from the JSON take their type's default.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] when the JSON doesn't fit the
    /// type, or a more specific error for bad base64 or enum literals.
    pub fn decode_value(&self, json: &JsonValue, ty: &ValueType) -> CodecResult<Value> {
        match (ty, json) {
            (_, JsonValue::Null) => Ok(Value::Null),
            (ValueType::Custom(name), _) => self.codec(name)?.decode(json),
            (ValueType::Bool, JsonValue::Bool(b)) => Ok(Value::Bool(*b)),
            (ValueType::Integer, JsonValue::Number(n)) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| CodecError::type_mismatch("integer", n.to_string())),
            (ValueType::Float, JsonValue::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| CodecError::type_mismatch("float", n.to_string())),
            (ValueType::Float, JsonValue::String(s)) => float_from_str(s)
                .map(Value::Float)
                .ok_or_else(|| CodecError::type_mismatch("float", format!("\"{s}\""))),
            (ValueType::Text, JsonValue::String(s)) => Ok(Value::Text(s.clone())),
            (ValueType::Bytes, JsonValue::String(s)) => BASE64
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| CodecError::InvalidBase64 {
                    message: e.to_string(),
                }),
            (ValueType::Enum { name, variants }, JsonValue::String(s)) => {
                check_variant(name, variants, s)?;
                Ok(Value::Enum(s.clone()))
            }
            (ValueType::List(element), JsonValue::Array(items)) => items
                .iter()
                .map(|item| self.decode_value(item, element))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::List),
            (ValueType::Map { key, value }, JsonValue::Object(object))
                if **key == ValueType::Text =>
            {
                object
                    .iter()
                    .map(|(k, v)| Ok((Value::Text(k.clone()), self.decode_value(v, value)?)))
                    .collect::<CodecResult<Vec<_>>>()
                    .map(Value::Map)
            }
            (ValueType::Map { key, value }, JsonValue::Array(entries)) => entries
                .iter()
                .map(|entry| {
                    let k = entry.get("key").unwrap_or(&JsonValue::Null);
                    let v = entry.get("value").unwrap_or(&JsonValue::Null);
                    Ok((self.decode_value(k, key)?, self.decode_value(v, value)?))
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Map),
            (ValueType::Composite { fields, .. }, JsonValue::Object(object)) => {
                let mut values = BTreeMap::new();
                for (name, field) in fields {
                    let v = match object.get(name) {
                        Some(json) => self.decode_value(json, field)?,
                        None => self.default_for(field),
                    };
                    values.insert(name.clone(), v);
                }
                Ok(Value::Composite(values))
            }
            (ty, json) => Err(CodecError::type_mismatch(ty.to_string(), json_kind(json))),
        }
    }
}

fn check_variant(name: &str, variants: &[String], literal: &str) -> CodecResult<()> {
    if variants.is_empty() || variants.iter().any(|v| v == literal) {
        Ok(())
    } else {
        Err(CodecError::InvalidEnumVariant {
            enum_name: name.to_string(),
            variant: literal.to_string(),
        })
    }
}

fn float_to_json(f: f64) -> JsonValue {
    if f.is_nan() {
        JsonValue::String("NaN".into())
    } else if f.is_infinite() {
        JsonValue::String(if f > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
    }
}

fn float_from_str(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
