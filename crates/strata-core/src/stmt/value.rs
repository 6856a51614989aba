use crate::{Error, Result};

use chrono::NaiveDateTime;
use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// A value read from, or written to, a connection.
///
/// The same type carries both the stored representation of a column and the
/// domain representation produced by its caster.
#[derive(Debug, Default, Clone)]
pub enum Value {
    /// Null value
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed 64-bit integer
    I64(i64),

    /// 64-bit float
    F64(f64),

    /// String value
    String(String),

    /// Raw bytes
    Bytes(Vec<u8>),

    /// Date and time without a timezone
    Timestamp(NaiveDateTime),

    /// Decoded JSON document
    Json(serde_json::Value),

    /// An enum-backed constant. Rendered into SQL verbatim, never quoted or
    /// bound.
    Enum(String),

    /// A list of values
    List(Vec<Value>),
}

impl Value {
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::I64(_) | Self::F64(_))
    }

    pub fn list_from_vec(items: Vec<Self>) -> Self {
        Self::List(items)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_i64(self) -> Result<i64> {
        match self {
            Self::I64(v) => Ok(v),
            Self::String(ref v) => v.parse().map_err(|_| Error::type_conversion(&self, "i64")),
            _ => Err(Error::type_conversion(&self, "i64")),
        }
    }

    pub fn to_bool(self) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(v),
            _ => Err(Error::type_conversion(&self, "bool")),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Self::String(v) | Self::Enum(v) => Ok(v),
            _ => Err(Error::type_conversion(&self, "String")),
        }
    }

    pub fn into_option_string(self) -> Result<Option<String>> {
        match self {
            Self::Null => Ok(None),
            value => value.into_string().map(Some),
        }
    }

    /// Converts the value into a JSON document for export.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::I64(v) => Json::from(*v),
            Value::F64(v) => Json::from(*v),
            Value::String(v) | Value::Enum(v) => Json::String(v.clone()),
            Value::Bytes(v) => Json::Array(v.iter().map(|byte| Json::from(*byte)).collect()),
            Value::Timestamp(v) => Json::String(v.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Json(v) => v.clone(),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::I64(_) => "I64",
            Self::F64(_) => "F64",
            Self::String(_) => "String",
            Self::Bytes(_) => "Bytes",
            Self::Timestamp(_) => "Timestamp",
            Self::Json(_) => "Json",
            Self::Enum(_) => "Enum",
            Self::List(_) => "List",
        }
    }
}

impl Error {
    /// Creates an error for a value that cannot be converted to `target`.
    pub fn type_conversion(value: &Value, target: &str) -> Error {
        crate::err!("cannot convert {} to {}", value.type_name(), target)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;

        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            // Bitwise so that `Value` can be `Eq` and used as a map key.
            (F64(a), F64(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);

        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) | Value::Enum(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Json(v) => v.to_string().hash(state),
            Value::List(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) | Value::Enum(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i32> for Value {
    fn from(src: i32) -> Self {
        Self::I64(src.into())
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<u32> for Value {
    fn from(src: u32) -> Self {
        Self::I64(src.into())
    }
}

impl From<f64> for Value {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(src: NaiveDateTime) -> Self {
        Self::Timestamp(src)
    }
}

impl From<serde_json::Value> for Value {
    fn from(src: serde_json::Value) -> Self {
        Self::Json(src)
    }
}

impl From<Vec<Value>> for Value {
    fn from(src: Vec<Value>) -> Self {
        Self::List(src)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(src: Option<T>) -> Self {
        match src {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn floats_are_hashable_keys() {
        let mut keys = HashSet::new();
        keys.insert(Value::F64(1.5));
        keys.insert(Value::F64(1.5));
        keys.insert(Value::I64(1));

        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn integer_and_string_are_distinct() {
        assert_ne!(Value::from(1), Value::from("1"));
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::String("a".into()));
    }

    #[test]
    fn to_i64_parses_strings() {
        assert_eq!(Value::from("42").to_i64().unwrap(), 42);
        assert_eq!(
            Value::Bool(true).to_i64().unwrap_err().to_string(),
            "cannot convert Bool to i64"
        );
    }
}
