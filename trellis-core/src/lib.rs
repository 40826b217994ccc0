//! Trellis Core
//!
//! This crate provides the state layer for Trellis, a declarative scene-graph
//! component library. Every component keeps its state in a signal store:
//!
//! - Reactive primitives (signals, memos, effects)
//! - A record-valued store with merging writes (`set`, `patch`)
//! - Memoized, per-path selections that downstream computations track
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `store`: The signal store and its merge rules
//! - `error`: Errors returned by fallible store operations
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::reactive::Memo;
//! use trellis_core::store::{Partial, SignalStore};
//!
//! // A line component's state
//! let store = SignalStore::from_value(json!({ "color": "black", "lineWidth": 1 })).unwrap();
//!
//! // Derived value over two selections
//! let color = store.select("color");
//! let width = store.select("lineWidth");
//! let label = Memo::new(move || format!("{} @ {}", color.get(), width.get()));
//! assert_eq!(label.get(), "\"black\" @ 1");
//!
//! // An input setter that may receive "no value"
//! let width_input: Option<f64> = None;
//! store.set(Partial::new().with("color", "red").with_optional("lineWidth", width_input));
//! assert_eq!(label.get(), "\"red\" @ 1");
//! ```

pub mod error;
pub mod reactive;
pub mod store;

pub use error::StoreError;
pub use reactive::{untracked, Effect, Memo, ReadSignal, Signal};
pub use store::{Partial, Record, SignalStore, StoreApi, StorePath};
