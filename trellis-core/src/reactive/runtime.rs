//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It manages the dependency graph and schedules updates when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal or memo is created, it registers with the runtime as a
//!    producer. Memos and effects also register as consumers.
//!
//! 2. When a memo or effect reads a producer, the runtime records the edge.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Walks the edges from the signal outward
//!    b. Marks every reached consumer as "maybe dirty"
//!    c. Runs the effects it reached, once each
//!    d. Memos are lazy - they recompute on next access
//!
//! 4. A "maybe dirty" consumer that is read compares the versions it saw
//!    during its last run with the current versions of its producers. Only
//!    when one differs does it recompute.
//!
//! # Thread Safety
//!
//! The registry is global and concurrent (`DashMap`), while the tracking
//! context is thread-local. No registry entry is borrowed while user code
//! runs.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};

use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this reactive value as potentially needing update.
    ///
    /// Returns true if the value was clean before, meaning its own
    /// dependents have not been told yet.
    fn mark_maybe_dirty(&self) -> bool;

    /// Schedule this reactive value for execution (effects only).
    fn schedule(&self);

    /// Check if this reactive value is an effect (eager) or memo (lazy).
    fn is_eager(&self) -> bool;

    /// The source ID under which this value is itself readable, if any.
    fn source_id(&self) -> Option<SourceId> {
        None
    }
}

/// A trait for values that others can depend on.
pub trait Producer: Send + Sync {
    /// Get the source ID of this producer.
    fn source_id(&self) -> SourceId;

    /// Monotonic counter bumped on every committed change.
    fn version(&self) -> u64;

    /// Bring the value up to date if it is stale.
    fn refresh(&self);
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    source_id: Option<SourceId>,
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveHandle {
    pub(crate) fn new(source_id: Option<SourceId>, subscriber_id: Option<SubscriberId>) -> Self {
        Self {
            source_id,
            subscriber_id,
        }
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        if let Some(id) = self.subscriber_id {
            Runtime::unregister_consumer(id);
        }
        if let Some(id) = self.source_id {
            Runtime::unregister_producer(id);
        }
    }
}

/// The global reactive runtime.
///
/// This is a singleton that manages all reactive values in the application.
pub struct Runtime;

static CONSUMERS: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static PRODUCERS: OnceLock<DashMap<SourceId, Weak<dyn Producer>>> = OnceLock::new();
static DEPENDENTS: OnceLock<DashMap<SourceId, IndexSet<SubscriberId>>> = OnceLock::new();

fn consumers() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    CONSUMERS.get_or_init(DashMap::new)
}

fn producers() -> &'static DashMap<SourceId, Weak<dyn Producer>> {
    PRODUCERS.get_or_init(DashMap::new)
}

fn dependents() -> &'static DashMap<SourceId, IndexSet<SubscriberId>> {
    DEPENDENTS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a consumer (memo or effect).
    pub fn register_consumer(reactive: Weak<dyn Reactive>, id: SubscriberId) {
        consumers().insert(id, reactive);
    }

    /// Register a producer (signal or memo).
    pub fn register_producer(producer: Weak<dyn Producer>, id: SourceId) {
        producers().insert(id, producer);
    }

    fn unregister_consumer(id: SubscriberId) {
        consumers().remove(&id);
    }

    fn unregister_producer(id: SourceId) {
        producers().remove(&id);
        dependents().remove(&id);
    }

    /// Record a read of `source` at `version` by the current computation.
    ///
    /// Called by producers on every tracked read. Outside a tracking context,
    /// or inside an untracked scope, this does nothing.
    pub fn track_read(source: SourceId, version: u64) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(source, version);
            Self::add_dependency(source, subscriber);
        }
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        dependents().entry(source).or_default().insert(subscriber);
    }

    /// Remove the edges from the given sources to `subscriber`.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies<I>(subscriber: SubscriberId, sources: I)
    where
        I: IntoIterator<Item = SourceId>,
    {
        for source in sources {
            if let Some(mut subs) = dependents().get_mut(&source) {
                subs.shift_remove(&subscriber);
            }
        }
    }

    /// Number of subscribers currently depending on `source`.
    pub fn dependent_count(source: SourceId) -> usize {
        dependents().get(&source).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Notify all subscribers that a source changed.
    ///
    /// Staleness is pushed through memos transitively; effects reached on the
    /// way are run once each after the walk completes.
    pub fn notify_source_change(source: SourceId) {
        let mut queue = VecDeque::from([source]);
        let mut effects: IndexMap<SubscriberId, Arc<dyn Reactive>> = IndexMap::new();

        while let Some(current) = queue.pop_front() {
            let subscriber_ids: Vec<SubscriberId> = match dependents().get(&current) {
                Some(subs) => subs.iter().copied().collect(),
                None => continue,
            };

            for id in subscriber_ids {
                let Some(reactive) = Self::consumer(id) else {
                    // Dropped since it last read `current`
                    if let Some(mut subs) = dependents().get_mut(&current) {
                        subs.shift_remove(&id);
                    }
                    continue;
                };

                if reactive.mark_maybe_dirty() {
                    if let Some(next) = reactive.source_id() {
                        queue.push_back(next);
                    }
                }

                if reactive.is_eager() {
                    effects.entry(id).or_insert(reactive);
                }
            }
        }

        for effect in effects.into_values() {
            effect.schedule();
        }
    }

    /// Check whether any of the recorded dependency versions is outdated.
    ///
    /// Stale memos among the dependencies are refreshed first, so a memo
    /// whose recomputation yielded an equal value does not count as changed.
    pub fn dependencies_changed(dependencies: &[(SourceId, u64)]) -> bool {
        dependencies.iter().any(|(source, seen)| match Self::producer(*source) {
            Some(producer) => {
                producer.refresh();
                producer.version() != *seen
            }
            None => true,
        })
    }

    fn consumer(id: SubscriberId) -> Option<Arc<dyn Reactive>> {
        let weak = consumers().get(&id).map(|entry| entry.value().clone());
        weak.and_then(|w| w.upgrade())
    }

    fn producer(id: SourceId) -> Option<Arc<dyn Producer>> {
        let weak = producers().get(&id).map(|entry| entry.value().clone());
        weak.and_then(|w| w.upgrade())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
