//! Error types for the signal store.

use thiserror::Error;

use crate::store::StorePath;

/// Errors returned by fallible store operations.
///
/// Infallible reads (`get`, `select`) never return these; they map an
/// unresolvable path to `None` or `Value::Null` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value that should have been a record (JSON object) was not.
    #[error("expected a record, found {found}")]
    NotARecord { found: &'static str },

    /// A path segment names a field that does not exist.
    #[error("path `{path}` does not resolve: `{segment}` is missing")]
    MissingSegment { path: StorePath, segment: String },

    /// A path segment tries to index into a value that has no fields.
    #[error("path `{path}` does not resolve: cannot read `{segment}` of {found}")]
    NotTraversable {
        path: StorePath,
        segment: String,
        found: &'static str,
    },

    /// The value at a path could not be decoded into the requested type.
    #[error("failed to decode value at `{path}`")]
    Decode {
        path: StorePath,
        #[source]
        source: serde_json::Error,
    },

    /// A typed value could not be encoded into a record.
    #[error("failed to encode state")]
    Encode(#[source] serde_json::Error),
}
