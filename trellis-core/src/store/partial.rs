//! Partial records written by `set` and `patch`.

use indexmap::IndexMap;
use serde_json::Value;

use super::record::{value_kind, Record};
use crate::error::StoreError;

/// A partial record: the fields a write wants to touch.
///
/// Each entry either carries a value or is *unset*. An unset entry means
/// "leave this field as it is": it never clears a field that currently holds
/// a non-null value. Use `Value::Null` to store an explicit null.
///
/// ```rust
/// use trellis_core::store::Partial;
///
/// let line_width: Option<f64> = None;
/// let partial = Partial::new()
///     .with("color", "red")
///     .with_optional("lineWidth", line_width);
///
/// assert_eq!(partial.len(), 2);
/// assert!(partial.is_unset("lineWidth"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partial {
    entries: IndexMap<String, Option<Value>>,
}

impl Partial {
    /// An empty partial.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Add a field that leaves the current value untouched.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    /// Add a field from an optional value; `None` becomes unset.
    ///
    /// This is the shape of an input setter that may receive "no value".
    pub fn with_optional<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.entries.insert(key.into(), value.map(Into::into));
        self
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Value>) {
        self.entries.insert(key.into(), value);
    }

    /// Look up an entry. The outer `Option` is the key's presence.
    pub fn get(&self, key: &str) -> Option<&Option<Value>> {
        self.entries.get(key)
    }

    /// Returns true if the key is present and unset.
    pub fn is_unset(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(None))
    }

    /// Number of entries, unset ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the partial has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    /// Build a partial from a JSON object. Every field carries its value.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Some(v))).collect()),
            other => Err(StoreError::NotARecord {
                found: value_kind(&other),
            }),
        }
    }
}

impl From<Record> for Partial {
    fn from(record: Record) -> Self {
        record.into_iter().map(|(k, v)| (k, Some(v))).collect()
    }
}

impl TryFrom<Value> for Partial {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Value>)> for Partial {
    fn from_iter<I: IntoIterator<Item = (K, Option<Value>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for Partial {
    type Item = (String, Option<Value>);
    type IntoIter = indexmap::map::IntoIter<String, Option<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
