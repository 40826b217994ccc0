//! Paths into nested store state.

use std::fmt;

use serde_json::Value;
use smallvec::SmallVec;

use super::record::{record_to_value, value_kind, Record};
use crate::error::StoreError;

/// An ordered sequence of field names leading into nested state.
///
/// The empty path addresses the whole record. Numeric segments index into
/// arrays, so `["points", "0"]` reads the first point.
///
/// Paths convert from the usual literal forms:
///
/// ```rust
/// use trellis_core::store::StorePath;
///
/// let a = StorePath::from("color");
/// let b = StorePath::from(["material", "color"]);
/// assert_eq!(a.len(), 1);
/// assert_eq!(b.to_string(), "material.color");
/// assert!(StorePath::root().is_root());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: SmallVec<[String; 4]>,
}

impl StorePath {
    /// The path addressing the whole record.
    pub fn root() -> Self {
        Self::default()
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path one level deeper.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Resolve this path against a record, cloning the value found.
    pub fn resolve(&self, record: &Record) -> Result<Value, StoreError> {
        let Some((first, rest)) = self.segments.split_first() else {
            return Ok(record_to_value(record));
        };

        let mut current = record.get(first).ok_or_else(|| self.missing(first))?;

        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment).ok_or_else(|| self.missing(segment))?,
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .ok_or_else(|| self.missing(segment))?,
                other => {
                    return Err(StoreError::NotTraversable {
                        path: self.clone(),
                        segment: segment.clone(),
                        found: value_kind(other),
                    })
                }
            };
        }

        Ok(current.clone())
    }

    fn missing(&self, segment: &str) -> StoreError {
        StoreError::MissingSegment {
            path: self.clone(),
            segment: segment.to_owned(),
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for StorePath {
    fn from(segment: &str) -> Self {
        Self {
            segments: SmallVec::from_iter([segment.to_owned()]),
        }
    }
}

impl From<String> for StorePath {
    fn from(segment: String) -> Self {
        Self {
            segments: SmallVec::from_iter([segment]),
        }
    }
}

impl<const N: usize> From<[&str; N]> for StorePath {
    fn from(segments: [&str; N]) -> Self {
        segments.into_iter().collect()
    }
}

impl From<&[&str]> for StorePath {
    fn from(segments: &[&str]) -> Self {
        segments.iter().copied().collect()
    }
}

impl From<Vec<String>> for StorePath {
    fn from(segments: Vec<String>) -> Self {
        segments.into_iter().collect()
    }
}

impl From<&StorePath> for StorePath {
    fn from(path: &StorePath) -> Self {
        path.clone()
    }
}

impl<S: Into<String>> FromIterator<S> for StorePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}
