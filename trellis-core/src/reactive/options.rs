//! Options for reactive primitives.
//!
//! Signals and memos share one options type. The only behavior it controls is
//! the equality check that decides whether a new value counts as a change.
//! An equal write to a signal is dropped without notifying anyone; an equal
//! recomputation of a memo keeps the previous value and does not stale its
//! dependents.

use std::fmt::Debug;
use std::sync::Arc;

/// A user-supplied equality function.
pub type EqualFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// How a reactive value decides whether a new value differs from the old one.
pub enum Equality<T> {
    /// Compare with `PartialEq`.
    Structural,

    /// Treat every new value as a change.
    Never,

    /// Compare with a custom function. Returning `true` means "equal".
    Custom(EqualFn<T>),
}

impl<T: PartialEq> Equality<T> {
    /// Returns true if `new` should be treated as the same value as `old`.
    pub fn eq(&self, old: &T, new: &T) -> bool {
        match self {
            Equality::Structural => old == new,
            Equality::Never => false,
            Equality::Custom(f) => f(old, new),
        }
    }
}

impl<T> Equality<T> {
    /// A hashable key for this equality.
    ///
    /// Custom functions are keyed by identity: two separately created
    /// functions never produce the same key, even if they behave alike.
    pub fn key(&self) -> EqualityKey {
        match self {
            Equality::Structural => EqualityKey::Structural,
            Equality::Never => EqualityKey::Never,
            Equality::Custom(f) => EqualityKey::Custom(Arc::as_ptr(f) as *const () as usize),
        }
    }
}

impl<T> Default for Equality<T> {
    fn default() -> Self {
        Equality::Structural
    }
}

impl<T> Clone for Equality<T> {
    fn clone(&self) -> Self {
        match self {
            Equality::Structural => Equality::Structural,
            Equality::Never => Equality::Never,
            Equality::Custom(f) => Equality::Custom(Arc::clone(f)),
        }
    }
}

impl<T> Debug for Equality<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Equality::Structural => f.write_str("Structural"),
            Equality::Never => f.write_str("Never"),
            Equality::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func)),
        }
    }
}

/// Hashable identity of an [`Equality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqualityKey {
    Structural,
    Never,
    Custom(usize),
}

/// Options accepted by [`Signal`](super::Signal) and [`Memo`](super::Memo).
pub struct ReactiveOptions<T> {
    /// Equality used to detect no-op updates.
    pub equal: Equality<T>,

    /// Name shown in `Debug` output and trace logs.
    pub debug_name: Option<String>,
}

/// Options for a [`Signal`](super::Signal).
pub type SignalOptions<T> = ReactiveOptions<T>;

/// Options for a [`Memo`](super::Memo).
pub type MemoOptions<T> = ReactiveOptions<T>;

impl<T> ReactiveOptions<T> {
    /// Use a custom equality function.
    pub fn with_equal_fn<F>(mut self, equal: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.equal = Equality::Custom(Arc::new(equal));
        self
    }

    /// Treat every write or recomputation as a change.
    pub fn always_notify(mut self) -> Self {
        self.equal = Equality::Never;
        self
    }

    /// Attach a debug name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// A hashable key identifying these options.
    ///
    /// Data-valued options compare structurally; function-valued options
    /// compare by identity.
    pub fn cache_key(&self) -> OptionsKey {
        OptionsKey {
            equal: self.equal.key(),
            debug_name: self.debug_name.clone(),
        }
    }
}

impl<T> Default for ReactiveOptions<T> {
    fn default() -> Self {
        Self {
            equal: Equality::default(),
            debug_name: None,
        }
    }
}

impl<T> Clone for ReactiveOptions<T> {
    fn clone(&self) -> Self {
        Self {
            equal: self.equal.clone(),
            debug_name: self.debug_name.clone(),
        }
    }
}

impl<T> Debug for ReactiveOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveOptions")
            .field("equal", &self.equal)
            .field("debug_name", &self.debug_name)
            .finish()
    }
}

/// Hashable identity of a [`ReactiveOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionsKey {
    equal: EqualityKey,
    debug_name: Option<String>,
}
