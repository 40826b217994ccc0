//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation the signal store is built on.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only when it is read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as pushing new material parameters into a scene object.
//!
//! ## Untracked reads
//!
//! [`untracked`] runs a closure with dependency tracking suspended, so a
//! computation can read state without subscribing to it.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.

mod context;
mod effect;
mod memo;
mod options;
mod runtime;
mod signal;
mod subscriber;

pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use options::{EqualFn, Equality, EqualityKey, MemoOptions, OptionsKey, ReactiveOptions, SignalOptions};
pub use runtime::{Producer, Reactive, ReactiveHandle, Runtime};
pub use signal::{ReadSignal, Signal};
pub use subscriber::{SourceId, Subscriber, SubscriberId};
