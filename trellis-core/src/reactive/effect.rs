//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime schedules the effect. It
//!    re-runs if one of the sources it read has a new version.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! 4. An effect notified while its body runs (because the body wrote a
//!    source it reads) runs again once the body returns, if a dependency
//!    actually moved. Such re-runs are bounded.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Lifetime
//!
//! The effect stays registered for as long as a handle to it exists.
//! Dropping the last handle, or calling [`Effect::dispose`], stops it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::warn;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};

/// Upper bound on re-runs caused by an effect writing its own dependencies.
const MAX_PASSES: usize = 100;

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    dependencies: RwLock<SmallVec<[(SourceId, u64); 4]>>,
    disposed: AtomicBool,
    /// Set while the body runs.
    running: AtomicBool,
    /// Set when the effect was scheduled while running.
    notified: AtomicBool,
    run_count: AtomicUsize,
    _handle: ReactiveHandle,
}

/// Clears the running flag, also when the body panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if self.running.swap(true, Ordering::SeqCst) {
            // Re-entered from our own body: pick it up after the current pass
            self.notified.store(true, Ordering::SeqCst);
            return;
        }
        let _guard = RunningGuard(&self.running);

        for pass in 1..=MAX_PASSES {
            self.notified.store(false, Ordering::SeqCst);
            self.run_once();

            if !self.notified.swap(false, Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
                return;
            }

            let dependencies = self.dependencies.read().clone();
            if !Runtime::dependencies_changed(&dependencies) {
                return;
            }

            if pass == MAX_PASSES {
                warn!(
                    effect = ?self.subscriber_id,
                    passes = MAX_PASSES,
                    "effect keeps invalidating its own dependencies, giving up"
                );
            }
        }
    }

    fn run_once(&self) {
        let previous = std::mem::take(&mut *self.dependencies.write());
        Runtime::clear_dependencies(self.subscriber_id, previous.iter().map(|(source, _)| *source));

        let dependencies = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.run)();
            ReactiveContext::get_dependencies()
        };

        *self.dependencies.write() = dependencies.into_iter().collect();
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) -> bool {
        // Effects have no dependents to forward staleness to
        false
    }

    fn schedule(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if self.running.load(Ordering::SeqCst) {
            self.notified.store(true, Ordering::SeqCst);
            return;
        }

        let dependencies = self.dependencies.read().clone();
        if Runtime::dependencies_changed(&dependencies) {
            self.execute();
        }
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(AtomicI32::new(-1));
///
/// let reader = count.clone();
/// let sink = seen.clone();
/// let _effect = Effect::new(move || sink.store(reader.get(), Ordering::SeqCst));
///
/// count.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies until the first [`execute`](Self::execute).
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Arc::new(EffectInner {
            subscriber_id,
            run: Box::new(run),
            dependencies: RwLock::new(SmallVec::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            notified: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            _handle: ReactiveHandle::new(None, Some(subscriber_id)),
        });

        let weak: Weak<dyn Reactive> = Arc::downgrade(&inner) as Weak<dyn Reactive>;
        Runtime::register_consumer(weak, subscriber_id);

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function unconditionally.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Re-run the effect if any of its dependencies changed.
    pub fn schedule(&self) {
        self.inner.schedule();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        let previous = std::mem::take(&mut *self.inner.dependencies.write());
        Runtime::clear_dependencies(
            self.inner.subscriber_id,
            previous.iter().map(|(source, _)| *source),
        );
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.read().len()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{untracked, Memo, Signal};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let effect = Effect::new_lazy(|| {});
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_signal_changes() {
        let signal = Signal::new(1);
        let observed = Arc::new(AtomicI32::new(0));

        let reader = signal.clone();
        let sink = observed.clone();
        let effect = Effect::new(move || {
            sink.store(reader.get(), Ordering::SeqCst);
        });

        signal.set(2);
        assert_eq!(observed.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 2);

        // Equal write: nothing committed, nothing re-run
        signal.set(2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn schedule_without_changes_is_a_noop() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        effect.schedule();
        effect.schedule();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_skips_memo_whose_value_did_not_change() {
        let signal = Signal::new(2);
        let source = signal.clone();
        let is_even = Memo::new(move || source.get() % 2 == 0);

        let reader = is_even.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        signal.set(4);
        assert_eq!(effect.run_count(), 1);

        signal.set(5);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let tracked = Signal::new(0);
        let ignored = Signal::new(0);

        let (a, b) = (tracked.clone(), ignored.clone());
        let effect = Effect::new(move || {
            a.get();
            untracked(|| b.get());
        });
        assert_eq!(effect.dependency_count(), 1);

        ignored.set(1);
        assert_eq!(effect.run_count(), 1);

        tracked.set(1);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        effect.schedule();
        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropped_effect_stops_running() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = signal.clone();
        let counter = runs.clone();
        let effect = Effect::new(move || {
            reader.get();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(effect);

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn effect_reruns_after_writing_its_own_dependency() {
        let signal = Signal::new(0);
        let last_seen = Arc::new(AtomicI32::new(-1));

        let source = signal.clone();
        let sink = last_seen.clone();
        let effect = Effect::new(move || {
            let value = source.get();
            sink.store(value, Ordering::SeqCst);
            if value < 3 {
                source.set(value + 1);
            }
        });

        assert_eq!(signal.get_untracked(), 3);
        assert_eq!(last_seen.load(Ordering::SeqCst), 3);
        assert_eq!(effect.run_count(), 4);

        // Still subscribed at the settled version
        signal.set(10);
        assert_eq!(last_seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn self_invalidating_effect_is_bounded() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            let value = source.get();
            source.set(value + 1);
        });

        assert_eq!(effect.run_count(), MAX_PASSES);
        assert_eq!(signal.get_untracked(), MAX_PASSES as i32);
    }
}
