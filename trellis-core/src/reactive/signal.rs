//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified.
//!
//! 3. Notifications mark dependent memos stale and re-run dependent effects.
//!
//! A write whose value is equal to the current one (per the signal's
//! [`Equality`](super::Equality)) is dropped: nothing is stored and nobody is notified.
//!
//! # Thread Safety
//!
//! Signals are thread-safe. The value is protected by a `parking_lot`
//! RwLock, which is never held while subscriber callbacks run.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use super::options::SignalOptions;
use super::runtime::{Producer, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, Subscriber, SubscriberId};

struct SignalInner<T> {
    id: SourceId,
    value: RwLock<T>,
    version: AtomicU64,
    options: SignalOptions<T>,
    /// Plain callbacks attached with [`Signal::subscribe`].
    notifiers: RwLock<Vec<Arc<Subscriber>>>,
    _handle: ReactiveHandle,
}

impl<T> Producer for SignalInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn refresh(&self) {}
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal produces another handle to the same value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }

    /// Create a new signal with explicit options.
    pub fn with_options(value: T, options: SignalOptions<T>) -> Self {
        let id = SourceId::new();
        let inner = Arc::new(SignalInner {
            id,
            value: RwLock::new(value),
            version: AtomicU64::new(0),
            options,
            notifiers: RwLock::new(Vec::new()),
            _handle: ReactiveHandle::new(Some(id), None),
        });

        let weak: Weak<dyn Producer> = Arc::downgrade(&inner) as Weak<dyn Producer>;
        Runtime::register_producer(weak, id);

        Self { inner }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Number of committed changes since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.read())
    }

    /// Borrow the current value without tracking the read.
    ///
    /// The value stays read-locked while `f` runs, so `f` must not write to
    /// this signal.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.read())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns false if the value was equal to the current one and the write
    /// was dropped.
    pub fn set(&self, value: T) -> bool {
        // The equality function may read this signal; compare outside the lock
        let current = self.inner.value.read().clone();
        if self.inner.options.equal.eq(&current, &value) {
            trace!(signal = ?self.inner.id, name = ?self.inner.options.debug_name, "write dropped: value unchanged");
            return false;
        }
        *self.inner.value.write() = value;

        let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(signal = ?self.inner.id, name = ?self.inner.options.debug_name, version, "signal changed");

        self.notify_subscribers();
        Runtime::notify_source_change(self.inner.id);
        true
    }

    /// Update the value using a function of the current value.
    ///
    /// The current value is read untracked, then written with [`set`](Self::set).
    /// The read and the write are separate steps: concurrent writers are not
    /// serialized, and a write landing in between is overwritten.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked();
        self.set(f(&current))
    }

    /// Get a read-only view of this signal.
    pub fn as_readonly(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    /// Register a callback invoked after every committed change.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new(notify);
        let id = subscriber.id();
        self.inner.notifiers.write().push(Arc::new(subscriber));
        id
    }

    /// Remove a callback registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner
            .notifiers
            .write()
            .retain(|subscriber| subscriber.id() != subscriber_id);
    }

    /// Get the number of dependents: tracked readers plus callbacks.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id) + self.inner.notifiers.read().len()
    }

    fn track(&self) {
        Runtime::track_read(self.inner.id, self.version());
    }

    fn notify_subscribers(&self) {
        // Snapshot first so callbacks may subscribe or write without deadlock
        let notifiers: Vec<Arc<Subscriber>> = self.inner.notifiers.read().clone();
        for subscriber in notifiers {
            subscriber.notify();
        }
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T>
where
    T: Clone + Send + Sync + PartialEq + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("name", &self.inner.options.debug_name)
            .field("value", &*self.inner.value.read())
            .field("version", &self.version())
            .finish()
    }
}

/// A read-only view of a [`Signal`].
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Get the underlying signal's ID.
    pub fn id(&self) -> SourceId {
        self.signal.id()
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking the read.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with_untracked(f)
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::OnceLock;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        signal.subscribe(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn signal_unsubscribe() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let subscriber_id = signal.subscribe(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.unsubscribe(subscriber_id);
        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn equal_write_is_dropped() {
        let signal = Signal::new(7);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        signal.subscribe(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.set(7));
        assert_eq!(signal.version(), 0);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn always_notify_commits_equal_writes() {
        let signal = Signal::with_options(7, SignalOptions::default().always_notify());

        assert!(signal.set(7));
        assert_eq!(signal.version(), 1);
    }

    #[test]
    fn custom_equality_decides_noop() {
        let options = SignalOptions::default().with_equal_fn(|a: &i32, b: &i32| a / 10 == b / 10);
        let signal = Signal::with_options(12, options);

        assert!(!signal.set(15));
        assert_eq!(signal.get(), 12);
        assert!(signal.set(21));
        assert_eq!(signal.get(), 21);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn readonly_view_follows_signal() {
        let signal = Signal::new(String::from("black"));
        let view = signal.as_readonly();

        signal.set("red".into());
        assert_eq!(view.get(), "red");
        assert_eq!(view.with_untracked(|s| s.len()), 3);
        assert_eq!(view.id(), signal.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn equality_function_may_read_the_signal() {
        let slot: Arc<OnceLock<Signal<i32>>> = Arc::new(OnceLock::new());
        let reader = slot.clone();
        let options = SignalOptions::default().with_equal_fn(move |old: &i32, new: &i32| {
            let current = reader.get().map(|s| s.get_untracked()).unwrap_or(*old);
            current == *new
        });

        let signal = Signal::with_options(0, options);
        let _ = slot.set(signal.clone());

        assert!(signal.set(1));
        assert!(!signal.set(1));
        assert_eq!(signal.get_untracked(), 1);
    }
}
