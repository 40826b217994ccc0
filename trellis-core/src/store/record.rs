//! The record held by a store.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::StoreError;

/// Store state: field names mapped to values of arbitrary shape.
///
/// Insertion ordered. A field that is absent reads as "undefined"; a field
/// holding `Value::Null` is present and null.
pub type Record = IndexMap<String, Value>;

/// Convert a record into a JSON object value.
pub fn record_to_value(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

/// Convert a JSON object value into a record.
pub fn record_from_value(value: Value) -> Result<Record, StoreError> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(StoreError::NotARecord {
            found: value_kind(&other),
        }),
    }
}

/// Short name of a value's JSON type, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
