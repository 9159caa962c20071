use crate::codec::{StoredFields, StoredValue};
use crate::collection::Document;
use crate::common::{Timestamp, Value};
use crate::errors::{CinderError, CinderResult, ErrorKind};
use std::collections::BTreeMap;

/// Converts a document into its stored form.
///
/// Native date/times become [Timestamp]s, existing timestamps pass through,
/// lists drop absent elements and mappings drop absent fields. A missing
/// document yields an empty mapping, never a null.
///
/// # Errors
///
/// Fails with [`ErrorKind::CodecError`] before anything is written when a
/// value has no stored form: non-finite floats and empty field names.
pub fn to_storage(document: Option<&Document>) -> CinderResult<StoredFields> {
    match document {
        Some(document) => encode_fields(document.iter()),
        None => Ok(StoredFields::new()),
    }
}

/// Converts one native value. `Ok(None)` means the value is absent and must
/// be dropped by the enclosing list or mapping.
pub fn to_storage_value(value: &Value) -> CinderResult<Option<StoredValue>> {
    let stored = match value {
        Value::Undefined | Value::Unsupported(_) => return Ok(None),
        Value::Null => StoredValue::Null,
        Value::Bool(b) => StoredValue::Bool(*b),
        Value::Integer(i) => StoredValue::Integer(*i),
        Value::Float(f) => {
            if !f.is_finite() {
                log::error!("Refusing to store non-finite float {}", f);
                return Err(CinderError::new(
                    &format!("Float value {} cannot be stored", f),
                    ErrorKind::CodecError,
                ));
            }
            StoredValue::Float(*f)
        }
        Value::String(s) => StoredValue::String(s.clone()),
        Value::DateTime(dt) => StoredValue::Timestamp(Timestamp::from_datetime(dt)),
        Value::Timestamp(ts) => StoredValue::Timestamp(*ts),
        Value::Array(values) => {
            let mut stored = Vec::with_capacity(values.len());
            for value in values {
                if let Some(element) = to_storage_value(value)? {
                    stored.push(element);
                }
            }
            StoredValue::Array(stored)
        }
        Value::Document(document) => StoredValue::Map(encode_fields(document.iter())?),
    };
    Ok(Some(stored))
}

fn encode_fields<'a, I>(fields: I) -> CinderResult<StoredFields>
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    let mut stored = BTreeMap::new();
    for (key, value) in fields {
        if key.is_empty() {
            return Err(CinderError::new(
                "Document field names must not be empty",
                ErrorKind::CodecError,
            ));
        }
        if let Some(value) = to_storage_value(value)? {
            stored.insert(key.clone(), value);
        }
    }
    Ok(stored)
}

/// Converts stored fields back into a document annotated with `id`.
///
/// Timestamps become native date/times; everything else maps one to one.
pub fn from_storage(fields: &StoredFields, id: &str) -> CinderResult<Document> {
    let mut document = decode_fields(fields)?;
    document.set_id(id);
    Ok(document)
}

pub fn from_storage_value(value: &StoredValue) -> CinderResult<Value> {
    Ok(match value {
        StoredValue::Null => Value::Null,
        StoredValue::Bool(b) => Value::Bool(*b),
        StoredValue::Integer(i) => Value::Integer(*i),
        StoredValue::Float(f) => Value::Float(*f),
        StoredValue::String(s) => Value::String(s.clone()),
        StoredValue::Timestamp(ts) => Value::DateTime(ts.to_datetime()?),
        StoredValue::Array(values) => Value::Array(
            values
                .iter()
                .map(from_storage_value)
                .collect::<CinderResult<Vec<_>>>()?,
        ),
        StoredValue::Map(map) => Value::Document(decode_fields(map)?),
    })
}

fn decode_fields(fields: &StoredFields) -> CinderResult<Document> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), from_storage_value(value)?)))
        .collect()
}
