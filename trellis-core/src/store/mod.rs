//! Signal Store
//!
//! A reactive state container for one component's worth of state, built on
//! the primitives in [`crate::reactive`].
//!
//! # Key Types
//!
//! - [`SignalStore`]: the store. Owns a signal holding a [`Record`] and a
//!   cache of per-path selections.
//! - [`StoreApi`]: the read/write half handed to initial-state factories.
//! - [`Partial`]: the fields a write touches. Entries may be unset, meaning
//!   "leave the current value alone".
//! - [`StorePath`]: a path into nested state.
//!
//! # Writes
//!
//! `set` overwrites the named fields, `patch` only fills in fields the state
//! does not have yet. Both commit at most one state transition, and a write
//! that leaves the state structurally equal commits none.

mod merge;
mod partial;
mod path;
mod record;
#[allow(clippy::module_inception)]
mod store;

pub use merge::{merge_patch, merge_set};
pub use partial::Partial;
pub use path::StorePath;
pub use record::{record_from_value, record_to_value, value_kind, Record};
pub use store::{SelectOptions, SignalStore, StoreApi};
