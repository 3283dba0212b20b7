//! Dynamic property value type.

use std::collections::BTreeMap;

/// A dynamic property value.
///
/// Values are untyped on their own; the [`ValueType`](crate::ValueType)
/// declared for a property decides how a value is encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value. Allowed for every type.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Text string.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Enumeration literal, by name.
    Enum(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Ordered map of key-value pairs. Build it with [`Value::map`] to merge
    /// repeated keys; a text-keyed map with a repeated key fails to encode.
    Map(Vec<(Value, Value)>),
    /// Nested structured value with named fields.
    Composite(BTreeMap<String, Value>),
}

impl Value {
    /// Create a map value, keeping the pairs in the given order.
    ///
    /// A later pair replaces an earlier one with an equal key.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Value::Map(out)
    }

    /// Create a composite value from named fields.
    pub fn composite<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Composite(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Composite(_) => "composite",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the enumeration literal, if this is one.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a field of a composite or a text key of a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Composite(fields) => fields.get(key),
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
