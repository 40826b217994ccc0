//! The signal store.
//!
//! A [`SignalStore`] wraps one [`Signal`] holding a [`Record`] and adds:
//!
//! - `get`: untracked reads by path,
//! - `select`: memoized, tracked derived values by path,
//! - `set` / `update`: merging writes that overwrite,
//! - `patch`: merging writes that only fill in missing fields.
//!
//! Every write is one transition of the underlying signal, committed inside
//! an untracked scope.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::merge::{merge_patch, merge_set};
use super::partial::Partial;
use super::path::StorePath;
use super::record::{record_from_value, Record};
use crate::error::StoreError;
use crate::reactive::{untracked, Memo, MemoOptions, OptionsKey, ReadSignal, Signal, SignalOptions};

/// Options for a selection made with [`SignalStore::select_with`].
pub type SelectOptions = MemoOptions<Value>;

/// Cache key of a selection: where it points and how it compares values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectKey {
    path: StorePath,
    options: OptionsKey,
}

/// The read and write half of a store.
///
/// This is what an initial-state factory receives: it operates on the same
/// signal the finished store will own.
#[derive(Clone)]
pub struct StoreApi {
    source: Signal<Record>,
}

impl StoreApi {
    /// Read the value at `path` without tracking.
    ///
    /// Returns `None` when the path does not resolve; see
    /// [`try_get`](Self::try_get) for the reason.
    pub fn get(&self, path: impl Into<StorePath>) -> Option<Value> {
        self.try_get(path).ok()
    }

    /// Read the value at `path` without tracking, reporting why a path does
    /// not resolve.
    pub fn try_get(&self, path: impl Into<StorePath>) -> Result<Value, StoreError> {
        let path = path.into();
        self.source.with_untracked(|state| path.resolve(state))
    }

    /// Read and decode the value at `path` without tracking.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<StorePath>) -> Result<T, StoreError> {
        let path = path.into();
        let value = self.try_get(&path)?;
        serde_json::from_value(value).map_err(|source| StoreError::Decode { path, source })
    }

    /// Clone the whole state without tracking.
    pub fn snapshot(&self) -> Record {
        self.source.get_untracked()
    }

    /// Merge `partial` over the state; its fields overwrite.
    pub fn set(&self, partial: impl Into<Partial>) {
        let partial = partial.into();
        self.commit("set", |previous| merge_set(previous, partial));
    }

    /// Merge the partial returned by `f` over the state.
    ///
    /// `f` receives the current state and runs untracked.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Record) -> Partial,
    {
        self.commit("update", |previous| merge_set(previous, f(previous)));
    }

    /// Merge `partial` under the state; only missing fields are added.
    pub fn patch(&self, partial: impl Into<Partial>) {
        let partial = partial.into();
        self.commit("patch", |previous| merge_patch(previous, partial));
    }

    fn commit<F>(&self, op: &'static str, merge: F)
    where
        F: FnOnce(&Record) -> Record,
    {
        let changed = untracked(|| self.source.update(merge));
        trace!(op, changed, signal = ?self.source.id(), "store write");
    }
}

impl fmt::Debug for StoreApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreApi").field("source", &self.source.id()).finish()
    }
}

struct StoreInner {
    api: StoreApi,
    state: ReadSignal<Record>,
    computed: Mutex<IndexMap<SelectKey, Memo<Value>>>,
}

/// A reactive container for one record of component state.
///
/// Cloning the store yields another handle to the same state and selection
/// cache.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::store::{Partial, SignalStore};
///
/// let store = SignalStore::from_value(json!({ "color": "black" })).unwrap();
/// let color = store.select("color");
///
/// store.set(Partial::new().with("color", "red").with("lineWidth", 2));
/// assert_eq!(color.get(), json!("red"));
///
/// store.patch(Partial::new().with("color", "blue").with("dashed", true));
/// assert_eq!(store.get("color"), Some(json!("red")));
/// assert_eq!(store.get("dashed"), Some(json!(true)));
/// ```
#[derive(Clone)]
pub struct SignalStore {
    inner: Arc<StoreInner>,
}

impl SignalStore {
    /// Create a store holding `initial`.
    pub fn new(initial: Record) -> Self {
        Self::with_options(initial, SignalOptions::default())
    }

    /// Create a store holding `initial`, with options for the state signal.
    pub fn with_options(initial: Record, options: SignalOptions<Record>) -> Self {
        Self::assemble(Signal::with_options(initial, options))
    }

    /// Create a store from a JSON object.
    pub fn from_value(initial: Value) -> Result<Self, StoreError> {
        Ok(Self::new(record_from_value(initial)?))
    }

    /// Create a store from any value that serializes to a JSON object.
    pub fn from_serialize<T: Serialize>(initial: &T) -> Result<Self, StoreError> {
        let value = serde_json::to_value(initial).map_err(StoreError::Encode)?;
        Self::from_value(value)
    }

    /// Create a store whose initial state is computed by `factory`.
    ///
    /// The factory receives a [`StoreApi`] over an empty state. Whatever it
    /// writes through that API is visible to its own reads, but the record
    /// it returns replaces the state wholesale: writes not carried into the
    /// returned record are discarded.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use trellis_core::store::{Partial, Record, SignalStore};
    ///
    /// let store = SignalStore::from_factory(|api| {
    ///     api.set(Partial::new().with("a", 1));
    ///     let a = api.get_as::<i64>("a").unwrap_or_default();
    ///     Record::from([("b".to_owned(), json!(a + 1))])
    /// });
    ///
    /// assert_eq!(store.get("b"), Some(json!(2)));
    /// assert_eq!(store.get("a"), None);
    /// ```
    pub fn from_factory<F>(factory: F) -> Self
    where
        F: FnOnce(&StoreApi) -> Record,
    {
        Self::from_factory_with_options(factory, SignalOptions::default())
    }

    /// Like [`from_factory`](Self::from_factory), with options for the state
    /// signal.
    pub fn from_factory_with_options<F>(factory: F, options: SignalOptions<Record>) -> Self
    where
        F: FnOnce(&StoreApi) -> Record,
    {
        match Self::try_from_factory_with_options(|api| Ok::<_, std::convert::Infallible>(factory(api)), options) {
            Ok(store) => store,
            Err(never) => match never {},
        }
    }

    /// Create a store from a fallible factory.
    ///
    /// An error returned by the factory is passed through and no store is
    /// created.
    pub fn try_from_factory<F, E>(factory: F) -> Result<Self, E>
    where
        F: FnOnce(&StoreApi) -> Result<Record, E>,
    {
        Self::try_from_factory_with_options(factory, SignalOptions::default())
    }

    /// Like [`try_from_factory`](Self::try_from_factory), with options for the
    /// state signal.
    pub fn try_from_factory_with_options<F, E>(
        factory: F,
        options: SignalOptions<Record>,
    ) -> Result<Self, E>
    where
        F: FnOnce(&StoreApi) -> Result<Record, E>,
    {
        let source = Signal::with_options(Record::new(), options);
        let api = StoreApi {
            source: source.clone(),
        };

        let initial = factory(&api)?;
        source.set(initial);

        Ok(Self::assemble(source))
    }

    fn assemble(source: Signal<Record>) -> Self {
        debug!(signal = ?source.id(), fields = source.with_untracked(|state| state.len()), "signal store created");

        Self {
            inner: Arc::new(StoreInner {
                state: source.as_readonly(),
                api: StoreApi { source },
                computed: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// The read and write half of this store.
    pub fn api(&self) -> &StoreApi {
        &self.inner.api
    }

    /// A read-only, tracked view of the whole state.
    pub fn state(&self) -> ReadSignal<Record> {
        self.inner.state.clone()
    }

    /// Clone the whole state without tracking.
    pub fn snapshot(&self) -> Record {
        self.inner.api.snapshot()
    }

    /// Read the value at `path` without tracking.
    ///
    /// The root path returns the whole state as a JSON object. A path that
    /// does not resolve (a missing field at any depth, or a segment applied to
    /// a scalar) returns `None`.
    pub fn get(&self, path: impl Into<StorePath>) -> Option<Value> {
        self.inner.api.get(path)
    }

    /// Read the value at `path` without tracking, reporting why a path does
    /// not resolve.
    pub fn try_get(&self, path: impl Into<StorePath>) -> Result<Value, StoreError> {
        self.inner.api.try_get(path)
    }

    /// Read and decode the value at `path` without tracking.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<StorePath>) -> Result<T, StoreError> {
        self.inner.api.get_as(path)
    }

    /// Merge `partial` over the state; its fields overwrite.
    ///
    /// An unset field keeps its current non-null value.
    pub fn set(&self, partial: impl Into<Partial>) {
        self.inner.api.set(partial);
    }

    /// Merge the partial returned by `f` over the state.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Record) -> Partial,
    {
        self.inner.api.update(f);
    }

    /// Merge `partial` under the state; only missing fields are added.
    pub fn patch(&self, partial: impl Into<Partial>) {
        self.inner.api.patch(partial);
    }

    /// A memoized, tracked view of the value at `path`.
    ///
    /// Repeated selections of the same path return the same memo. A path
    /// that does not resolve reads as `Value::Null`.
    pub fn select(&self, path: impl Into<StorePath>) -> Memo<Value> {
        self.select_with(path, SelectOptions::default())
    }

    /// Like [`select`](Self::select), with options for the memo.
    ///
    /// Selections are cached per path and per options: options with equal
    /// data share a memo, custom equality functions are told apart by
    /// identity.
    pub fn select_with(&self, path: impl Into<StorePath>, options: SelectOptions) -> Memo<Value> {
        let path = path.into();
        let key = SelectKey {
            path: path.clone(),
            options: options.cache_key(),
        };

        let mut computed = self.inner.computed.lock();
        computed
            .entry(key)
            .or_insert_with(|| {
                debug!(path = %path, options = ?options, "creating selection");
                let state = self.inner.state.clone();
                Memo::with_options(
                    move || state.with(|record| path.resolve(record).unwrap_or(Value::Null)),
                    options,
                )
            })
            .clone()
    }

    /// Number of distinct selections cached so far.
    pub fn selection_count(&self) -> usize {
        self.inner.computed.lock().len()
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new(Record::new())
    }
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("state", &self.snapshot())
            .field("selections", &self.selection_count())
            .finish()
    }
}
