//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result,
//!    recording every source it read and the version it saw.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked "maybe dirty".
//!
//! 4. On next access, the memo re-checks if inputs actually changed by
//!    comparing the recorded versions with the current ones.
//!
//! 5. If inputs changed, recompute. Otherwise, mark clean and return cache.
//!
//! A recomputation that produces a value equal to the cached one (per the
//! memo's [`Equality`](super::Equality)) keeps the cached value and leaves the
//! memo's version untouched, so memos and effects downstream stay clean.
//!
//! # Thread Safety
//!
//! Memos are thread-safe. No lock is held while the computation runs.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::options::MemoOptions;
use super::runtime::{Producer, Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency might have changed. Need to check.
    MaybeDirty,

    /// The memo definitely needs to recompute.
    Dirty,

    /// The computation is running right now.
    Computing,
}

struct MemoInner<T> {
    source_id: SourceId,
    subscriber_id: SubscriberId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<MemoState>,
    version: AtomicU64,
    /// Sources read by the last computation, with the versions seen.
    dependencies: RwLock<SmallVec<[(SourceId, u64); 4]>>,
    compute_count: AtomicU64,
    options: MemoOptions<T>,
    _handle: ReactiveHandle,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn label(&self) -> String {
        match &self.options.debug_name {
            Some(name) => format!("`{name}`"),
            None => format!("{:?}", self.source_id),
        }
    }

    /// Return the current value, recomputing first if it is stale.
    fn current_value(&self) -> T {
        let state = *self.state.lock();

        match state {
            MemoState::Clean => {
                if let Some(value) = self.value.read().clone() {
                    return value;
                }
            }
            MemoState::MaybeDirty => {
                let dependencies = self.dependencies.read().clone();
                if !Runtime::dependencies_changed(&dependencies) {
                    {
                        let mut state = self.state.lock();
                        if *state == MemoState::MaybeDirty {
                            *state = MemoState::Clean;
                        }
                    }
                    if let Some(value) = self.value.read().clone() {
                        return value;
                    }
                }
            }
            MemoState::Computing => {
                panic!("cycle detected: memo {} read itself while computing", self.label())
            }
            MemoState::Dirty => {}
        }

        self.recompute()
    }

    /// Run the computation within a reactive context to track dependencies.
    fn recompute(&self) -> T {
        *self.state.lock() = MemoState::Computing;

        let previous = std::mem::take(&mut *self.dependencies.write());
        Runtime::clear_dependencies(self.subscriber_id, previous.iter().map(|(source, _)| *source));

        let (value, dependencies) = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let value = (self.compute)();
            (value, ReactiveContext::get_dependencies())
        };

        *self.dependencies.write() = dependencies.into_iter().collect();
        self.compute_count.fetch_add(1, Ordering::Relaxed);

        // The equality function may read this memo; compare outside the lock
        let previous = self.value.read().clone();
        let result = match previous {
            Some(old) if self.options.equal.eq(&old, &value) => old,
            _ => {
                *self.value.write() = Some(value.clone());
                self.version.fetch_add(1, Ordering::AcqRel);
                value
            }
        };

        {
            // A dependency written during the computation leaves us dirty
            let mut state = self.state.lock();
            if *state == MemoState::Computing {
                *state = MemoState::Clean;
            }
        }

        trace!(memo = %self.label(), version = self.version.load(Ordering::Acquire), "memo recomputed");
        result
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            MemoState::Clean => {
                *state = MemoState::MaybeDirty;
                true
            }
            MemoState::Computing => {
                *state = MemoState::Dirty;
                true
            }
            MemoState::MaybeDirty | MemoState::Dirty => false,
        }
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }

    fn source_id(&self) -> Option<SourceId> {
        Some(self.source_id)
    }
}

impl<T> Producer for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn refresh(&self) {
        self.current_value();
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync + PartialEq.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos might return the same value even if inputs changed).
///
/// Cloning a memo produces another handle to the same cache.
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_options(compute, MemoOptions::default())
    }

    /// Create a new memo with explicit options.
    pub fn with_options<F>(compute: F, options: MemoOptions<T>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let source_id = SourceId::new();
        let subscriber_id = SubscriberId::new();

        let inner = Arc::new(MemoInner {
            source_id,
            subscriber_id,
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(MemoState::Dirty),
            version: AtomicU64::new(0),
            dependencies: RwLock::new(SmallVec::new()),
            compute_count: AtomicU64::new(0),
            options,
            _handle: ReactiveHandle::new(Some(source_id), Some(subscriber_id)),
        });

        let as_consumer: Weak<dyn Reactive> = Arc::downgrade(&inner) as Weak<dyn Reactive>;
        let as_producer: Weak<dyn Producer> = Arc::downgrade(&inner) as Weak<dyn Producer>;
        Runtime::register_consumer(as_consumer, subscriber_id);
        Runtime::register_producer(as_producer, source_id);

        Self { inner }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.source_id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context, the running computation starts depending
    /// on this memo.
    pub fn get(&self) -> T {
        let value = self.inner.current_value();
        Runtime::track_read(self.inner.source_id, self.version());
        value
    }

    /// Get the current value, recomputing if necessary, without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.current_value()
    }

    /// Mark the memo as potentially needing recomputation.
    pub fn mark_maybe_dirty(&self) {
        if Reactive::mark_maybe_dirty(&*self.inner) {
            Runtime::notify_source_change(self.inner.source_id);
        }
    }

    /// Mark the memo as definitely needing recomputation.
    pub fn mark_dirty(&self) {
        let was = std::mem::replace(&mut *self.inner.state.lock(), MemoState::Dirty);
        if was == MemoState::Clean {
            Runtime::notify_source_change(self.inner.source_id);
        }
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Number of value changes since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Number of times the computation has run.
    pub fn compute_count(&self) -> u64 {
        self.inner.compute_count.load(Ordering::Relaxed)
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.source_id)
    }

    /// Get the number of sources read by the last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.read().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Returns true if both handles refer to the same memo.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.source_id)
            .field("name", &self.inner.options.debug_name)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
