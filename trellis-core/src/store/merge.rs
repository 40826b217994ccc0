//! Merge rules for `set` and `patch`.
//!
//! Both start by backfilling: an unset entry whose previous value exists and
//! is not null takes the previous value. They differ in precedence:
//!
//! - `set` overwrites: `{ ...previous, ...partial }`.
//! - `patch` fills gaps: `{ ...partial, ...previous }`, so only keys the
//!   previous record lacks are introduced.
//!
//! An unset entry left after backfilling (previous value null or absent)
//! stands for "undefined", which a record represents by the key's absence.

use serde_json::Value;

use super::partial::Partial;
use super::record::Record;

/// Resolve unset entries against the previous record.
fn backfill(previous: &Record, partial: Partial) -> impl Iterator<Item = (String, Option<Value>)> + '_ {
    partial.into_iter().map(move |(key, value)| match value {
        None => match previous.get(&key) {
            Some(prev) if !prev.is_null() => {
                let prev = prev.clone();
                (key, Some(prev))
            }
            _ => (key, None),
        },
        Some(value) => (key, Some(value)),
    })
}

/// Merge for `set`: partial entries overwrite, other fields are kept.
///
/// Existing keys keep their position; new keys are appended.
pub fn merge_set(previous: &Record, partial: Partial) -> Record {
    let mut next = previous.clone();

    for (key, value) in backfill(previous, partial) {
        match value {
            Some(value) => {
                next.insert(key, value);
            }
            None => {
                next.shift_remove(&key);
            }
        }
    }

    next
}

/// Merge for `patch`: previous fields win, only new keys are added.
///
/// Keys named by the partial come first, in the partial's order, followed
/// by the remaining previous keys.
pub fn merge_patch(previous: &Record, partial: Partial) -> Record {
    let mut next = Record::with_capacity(previous.len() + partial.len());

    for (key, value) in backfill(previous, partial) {
        match previous.get(&key) {
            Some(prev) => {
                next.insert(key, prev.clone());
            }
            None => {
                if let Some(value) = value {
                    next.insert(key, value);
                }
            }
        }
    }

    for (key, value) in previous {
        if !next.contains_key(key) {
            next.insert(key.clone(), value.clone());
        }
    }

    next
}
