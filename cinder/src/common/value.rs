use crate::collection::Document;
use crate::common::Timestamp;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A field value in the in-memory (native) representation of a [Document].
///
/// # Variants
/// - `Null`, `Bool`, `Integer`, `Float`, `String`: JSON-compatible scalars
/// - `DateTime`: a native date/time; stored as a [Timestamp]
/// - `Timestamp`: an already fixed-point time; stored unchanged
/// - `Array`, `Document`: ordered lists and embedded mappings
/// - `Undefined`: an explicitly absent value; dropped on write
/// - `Unsupported`: a value with no storage form (a callback handle, a
///   symbol); dropped on write. The string names what it was.
///
/// Equality is semantic rather than structural: `Integer(1)` equals
/// `Float(1.0)` and a `DateTime` equals the `Timestamp` of the same instant,
/// matching how the store compares stored values.
///
/// # Usage
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let v3 = Value::from(Utc::now());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Document(Document),
    Undefined,
    Unsupported(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for values the data codec drops instead of storing.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Undefined | Value::Unsupported(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns any numeric value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the instant held by either a `DateTime` or a `Timestamp`.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Timestamp(ts) => ts.to_datetime().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    fn instant(&self) -> Option<Timestamp> {
        match self {
            Value::DateTime(dt) => Some(Timestamp::from_datetime(dt)),
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::Undefined => "undefined",
            Value::Unsupported(_) => "unsupported",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.instant(), other.instant()) {
            return a == b;
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Unsupported(a), Value::Unsupported(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Document(doc) => write!(f, "{}", doc),
            Value::Undefined => write!(f, "undefined"),
            Value::Unsupported(kind) => write!(f, "<unsupported {}>", kind),
        }
    }
}

macro_rules! value_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Integer(value as i64)
                }
            }
        )*
    };
}

value_from_integer!(i8, u8, i16, u16, i32, u32, i64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// Typed extraction of a native value, used by entity decoders.
///
/// `Option<T>` maps both `Null` and a missing field to `None`, so optional
/// entity fields decode naturally.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> CinderResult<Self>;

    /// Decodes a field that is missing from its document.
    fn from_missing(field: &str) -> CinderResult<Self> {
        Err(CinderError::new(
            &format!("Required field '{}' is missing", field),
            ErrorKind::CodecError,
        ))
    }
}

fn mismatch<T>(expected: &str, value: &Value) -> CinderResult<T> {
    log::error!("Expected {} but found {} ({})", expected, value.type_name(), value);
    Err(CinderError::new(
        &format!("Expected a {} value but found {}", expected, value.type_name()),
        ErrorKind::CodecError,
    ))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> CinderResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value.as_bool().map_or_else(|| mismatch("bool", value), Ok)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value.as_i64().map_or_else(|| mismatch("integer", value), Ok)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value.as_f64().map_or_else(|| mismatch("number", value), Ok)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value
            .as_str()
            .map_or_else(|| mismatch("string", value), |s| Ok(s.to_string()))
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value.as_datetime().map_or_else(|| mismatch("datetime", value), Ok)
    }
}

impl FromValue for Document {
    fn from_value(value: &Value) -> CinderResult<Self> {
        value
            .as_document()
            .map_or_else(|| mismatch("document", value), |d| Ok(d.clone()))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> CinderResult<Self> {
        match value {
            Value::Array(values) => values.iter().map(T::from_value).collect(),
            _ => mismatch("array", value),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> CinderResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_missing(_field: &str) -> CinderResult<Self> {
        Ok(None)
    }
}
