//! Column values exchanged between entities and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::shared::DomainError;

mod record;
pub use record::Record;

/// A single column value.
///
/// Mirrors SQLite's storage classes plus `Bool`, which the store keeps as an
/// integer and hands back as `Integer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Storage class name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }
}

// Real values compare and hash by bit pattern so `Value` can key a HashMap.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Blob(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(i64, Integer);
value_from!(i32, Integer);
value_from!(u32, Integer);
value_from!(f64, Real);
value_from!(String, Text);
value_from!(Vec<u8>, Blob);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Text(v.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Text(v.hyphenated().to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a column value into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, DomainError>;
}

fn mismatch(expected: &str, value: &Value) -> DomainError {
    DomainError::Mapping(format!(
        "expected {}, found {} value {}",
        expected,
        value.type_name(),
        value
    ))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        value.as_i64().ok_or_else(|| mismatch("INTEGER", &value))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| DomainError::Mapping(format!("{} does not fit in i32", wide)))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        let wide = i64::from_value(value)?;
        u32::try_from(wide)
            .map_err(|_| DomainError::Mapping(format!("{} does not fit in u32", wide)))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch("REAL", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Integer(v) => Ok(v != 0),
            other => Err(mismatch("BOOLEAN", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(mismatch("BLOB", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    /// Accepts RFC 3339 text and SQLite's `YYYY-MM-DD HH:MM:SS` form.
    fn from_value(value: Value) -> Result<Self, DomainError> {
        let text = String::from_value(value)?;

        if let Ok(dt) = text.parse::<DateTime<Utc>>() {
            return Ok(dt);
        }

        let iso_format = text.replace(' ', "T") + "Z";
        iso_format
            .parse::<DateTime<Utc>>()
            .map_err(|e| DomainError::Mapping(format!("Invalid datetime '{}': {}", text, e)))
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Text(v) => Uuid::parse_str(&v)
                .map_err(|e| DomainError::Mapping(format!("Invalid uuid '{}': {}", v, e))),
            Value::Blob(v) => Uuid::from_slice(&v)
                .map_err(|e| DomainError::Mapping(format!("Invalid uuid bytes: {}", e))),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_integer_round_trip_through_bool() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert!(bool::from_value(Value::Integer(1)).unwrap());
        assert!(!bool::from_value(Value::Integer(0)).unwrap());
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::Text("x".into())).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_mismatch_is_mapping_error() {
        let err = i64::from_value(Value::Text("12".into())).unwrap_err();
        assert!(matches!(err, DomainError::Mapping(_)));
    }

    #[test]
    fn test_i32_overflow_rejected() {
        assert!(i32::from_value(Value::Integer(i64::MAX)).is_err());
        assert_eq!(i32::from_value(Value::Integer(42)).unwrap(), 42);
    }

    #[test]
    fn test_datetime_accepts_sqlite_format() {
        let expected = Utc.with_ymd_and_hms(2025, 12, 20, 12, 34, 56).unwrap();

        let iso = DateTime::<Utc>::from_value(Value::Text("2025-12-20T12:34:56Z".into())).unwrap();
        let sqlite = DateTime::<Utc>::from_value(Value::Text("2025-12-20 12:34:56".into())).unwrap();

        assert_eq!(iso, expected);
        assert_eq!(sqlite, expected);
        assert_eq!(
            DateTime::<Utc>::from_value(Value::from(expected)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_uuid_text_and_blob() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_value(Value::from(id)).unwrap(), id);
        assert_eq!(Uuid::from_value(Value::Blob(id.as_bytes().to_vec())).unwrap(), id);
    }

    #[test]
    fn test_values_hash_consistently() {
        let mut set = HashSet::new();
        set.insert(Value::Integer(1));
        set.insert(Value::Integer(1));
        set.insert(Value::Real(1.0));
        set.insert(Value::Text("1".into()));

        assert_eq!(set.len(), 3);
        assert_ne!(Value::Integer(1), Value::Real(1.0));
    }
}
