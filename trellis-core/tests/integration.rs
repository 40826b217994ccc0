//! Integration Tests for the Reactive System and Signal Store
//!
//! These tests verify that signals, memos, effects and stores work together
//! correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use trellis_core::reactive::{
    untracked, Effect, Memo, MemoState, ReactiveContext, Runtime, Signal, SourceId, SubscriberId,
};
use trellis_core::store::{Partial, Record, SelectOptions, SignalStore, StorePath};
use trellis_core::StoreError;

/// Test that a memo tracks signal dependencies.
#[test]
fn memo_tracks_signal_dependency() {
    let signal = Signal::new(10);

    let signal_clone = signal.clone();
    let memo = Memo::new(move || signal_clone.get() * 2);

    // First access computes the value
    assert_eq!(memo.get(), 20);

    // The write marks the memo stale; the next read recomputes
    signal.set(5);
    assert_eq!(memo.state(), MemoState::MaybeDirty);
    assert_eq!(memo.get(), 10);
}

/// Test that an effect re-runs when its dependency changes.
#[test]
fn effect_tracks_signal_dependency() {
    let signal = Signal::new(0);
    let observed_value = Arc::new(AtomicI32::new(-1));
    let observed_clone = observed_value.clone();

    let signal_clone = signal.clone();
    let _effect = Effect::new(move || {
        observed_clone.store(signal_clone.get(), Ordering::SeqCst);
    });

    // Effect runs on creation, captures initial value
    assert_eq!(observed_value.load(Ordering::SeqCst), 0);

    signal.set(42);
    assert_eq!(observed_value.load(Ordering::SeqCst), 42);
}

/// Test that memos cache values correctly.
#[test]
fn memo_caches_expensive_computation() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let compute_clone = compute_count.clone();

    let memo = Memo::new(move || {
        compute_clone.fetch_add(1, Ordering::SeqCst);
        42
    });

    assert_eq!(memo.get(), 42);
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);

    // Subsequent accesses use cache
    assert_eq!(memo.get(), 42);
    assert_eq!(memo.get(), 42);
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);
}

/// Test that memos can depend on other memos.
#[test]
fn memo_depends_on_memo() {
    let base_signal = Signal::new(5);

    let signal_clone = base_signal.clone();
    let doubled = Memo::new(move || signal_clone.get() * 2);

    let doubled_clone = doubled.clone();
    let plus_ten = Memo::new(move || doubled_clone.get() + 10);

    assert_eq!(doubled.get(), 10);
    assert_eq!(plus_ten.get(), 20);

    base_signal.set(10);

    // Staleness reaches both levels
    assert_eq!(doubled.state(), MemoState::MaybeDirty);
    assert_eq!(plus_ten.state(), MemoState::MaybeDirty);
    assert_eq!(plus_ten.get(), 30);
    assert_eq!(doubled.get(), 20);
}

/// Test that a recomputation yielding an equal value stops propagation.
#[test]
fn equal_memo_result_skips_downstream() {
    let signal = Signal::new(3);
    let runs = Arc::new(AtomicI32::new(0));

    let signal_clone = signal.clone();
    let parity = Memo::new(move || signal_clone.get() % 2);

    let parity_clone = parity.clone();
    let runs_clone = runs.clone();
    let _effect = Effect::new(move || {
        parity_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    signal.set(5);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    signal.set(6);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test effect disposal stops execution.
#[test]
fn disposed_effect_does_not_run() {
    let signal = Signal::new(0);
    let run_count = Arc::new(AtomicI32::new(0));

    let signal_clone = signal.clone();
    let run_clone = run_count.clone();
    let effect = Effect::new(move || {
        signal_clone.get();
        run_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    effect.dispose();

    signal.set(1);
    effect.schedule();
    effect.execute();

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
}

/// Test that ReactiveContext correctly tracks nested computations.
#[test]
fn nested_reactive_contexts() {
    let outer_id = SubscriberId::new();
    let inner_id = SubscriberId::new();
    let sources: Vec<SourceId> = (0..4).map(|_| SourceId::new()).collect();

    let _outer_ctx = ReactiveContext::enter(outer_id);
    ReactiveContext::track_dependency(sources[0], 0);
    ReactiveContext::track_dependency(sources[1], 0);

    {
        let _inner_ctx = ReactiveContext::enter(inner_id);
        ReactiveContext::track_dependency(sources[2], 0);
        ReactiveContext::track_dependency(sources[3], 0);

        // Inner context should see its own dependencies
        let inner_deps = ReactiveContext::get_dependencies();
        assert_eq!(inner_deps, vec![(sources[2], 0), (sources[3], 0)]);
    }

    // Back to outer context, should see outer dependencies only
    let outer_deps = ReactiveContext::get_dependencies();
    assert_eq!(outer_deps, vec![(sources[0], 0), (sources[1], 0)]);
}

/// Test the complete reactive chain: reads register edges with the runtime,
/// writes find dependents through it.
#[test]
fn full_reactive_chain_with_runtime() {
    let signal = Signal::new(100);
    let signal_id = signal.id();

    let signal_clone = signal.clone();
    let memo = Memo::new(move || signal_clone.get() * 3);
    assert_eq!(Runtime::dependent_count(signal_id), 0);

    assert_eq!(memo.get(), 300);
    assert_eq!(Runtime::dependent_count(signal_id), 1);

    signal.set(50);
    assert_eq!(memo.get(), 150);

    // A dropped memo is pruned on the next notification
    drop(memo);
    signal.set(10);
    assert_eq!(Runtime::dependent_count(signal_id), 0);
}

/// Test that untracked reads do not create dependencies.
#[test]
fn untracked_reads_inside_memo() {
    let tracked = Signal::new(1);
    let ignored = Signal::new(100);

    let (t, i) = (tracked.clone(), ignored.clone());
    let memo = Memo::new(move || t.get() + untracked(|| i.get()));

    assert_eq!(memo.get(), 101);
    assert_eq!(memo.dependency_count(), 1);

    ignored.set(200);
    assert_eq!(memo.state(), MemoState::Clean);
    assert_eq!(memo.get(), 101);

    tracked.set(2);
    assert_eq!(memo.get(), 202);
}

/// Test the store's documented write semantics end to end.
#[test]
fn store_set_then_patch() {
    let store = SignalStore::from_value(json!({ "color": "black" })).unwrap();

    store.set(Partial::new().with("color", "red").with("lineWidth", 2));
    assert_eq!(
        store.get(StorePath::root()),
        Some(json!({ "color": "red", "lineWidth": 2 }))
    );

    store.patch(Partial::new().with("color", "blue").with("dashed", true));
    assert_eq!(
        store.get(StorePath::root()),
        Some(json!({ "color": "red", "lineWidth": 2, "dashed": true }))
    );
}

/// Test that the factory sees its own writes but its return value wins.
#[test]
fn store_factory_initial_state() {
    let store = SignalStore::from_factory(|api| {
        api.set(Partial::new().with("a", 1));
        let a = api.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
        Record::from([("b".to_owned(), json!(a + 1))])
    });

    assert_eq!(store.get(StorePath::root()), Some(json!({ "b": 2 })));
}

/// Test that a failing factory produces no store.
#[test]
fn store_factory_error() {
    let result: Result<SignalStore, StoreError> = SignalStore::try_from_factory(|api| {
        api.get_as::<f64>("opacity")?;
        Ok(Record::new())
    });

    assert!(matches!(result, Err(StoreError::MissingSegment { .. })));
}

/// Test that selections are shared and follow the state.
#[test]
fn store_select_identity_and_updates() {
    let store = SignalStore::from_value(json!({ "a": { "b": 1 } })).unwrap();

    let b = store.select(["a", "b"]);
    assert!(b.ptr_eq(&store.select(["a", "b"])));
    assert!(!b.ptr_eq(&store.select_with(["a", "b"], SelectOptions::default().named("b"))));

    assert_eq!(b.get(), json!(1));
    store.set(Partial::new().with("a", json!({ "b": 2 })));
    assert_eq!(b.get(), json!(2));

    store.set(Partial::new().with("a", json!({ "c": 3 })));
    assert_eq!(b.get(), Value::Null);
}

/// Test that `get` inside a derived computation does not subscribe it.
#[test]
fn store_get_is_untracked() {
    let store = SignalStore::from_value(json!({ "scale": 2, "offset": 1 })).unwrap();

    let reader = store.clone();
    let scale = store.select("scale");
    let value = Memo::new(move || {
        let offset = reader.get("offset").and_then(|v| v.as_i64()).unwrap_or(0);
        scale.get().as_i64().unwrap_or(0) * 10 + offset
    });
    assert_eq!(value.get(), 21);

    store.set(Partial::new().with("offset", 5));
    assert_eq!(value.get(), 21);

    store.set(Partial::new().with("scale", 3));
    assert_eq!(value.get(), 35);
}

/// A line component: each input setter writes one field, each field has its
/// own selection, and a derived material combines them.
#[test]
fn line_component_inputs() {
    #[derive(Debug, Clone, PartialEq)]
    struct LineMaterial {
        color: String,
        line_width: f64,
        dashed: bool,
    }

    struct Line {
        store: SignalStore,
    }

    impl Line {
        fn new() -> Self {
            Self {
                store: SignalStore::from_value(json!({
                    "color": "white",
                    "lineWidth": 1.0,
                    "dashed": false,
                }))
                .unwrap(),
            }
        }

        fn set_color(&self, color: Option<&str>) {
            self.store.set(Partial::new().with_optional("color", color));
        }

        fn set_line_width(&self, width: Option<f64>) {
            self.store.set(Partial::new().with_optional("lineWidth", width));
        }

        fn set_dashed(&self, dashed: Option<bool>) {
            self.store.set(Partial::new().with_optional("dashed", dashed));
        }

        fn material(&self) -> Memo<LineMaterial> {
            let color = self.store.select("color");
            let line_width = self.store.select("lineWidth");
            let dashed = self.store.select("dashed");

            Memo::new(move || LineMaterial {
                color: color.get().as_str().unwrap_or_default().to_owned(),
                line_width: line_width.get().as_f64().unwrap_or(1.0),
                dashed: dashed.get().as_bool().unwrap_or(false),
            })
        }
    }

    let line = Line::new();
    let material = line.material();
    let applied = Arc::new(AtomicI32::new(0));

    let material_clone = material.clone();
    let applied_clone = applied.clone();
    let _apply = Effect::new(move || {
        material_clone.get();
        applied_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(applied.load(Ordering::SeqCst), 1);

    line.set_color(Some("red"));
    assert_eq!(material.get().color, "red");
    assert_eq!(applied.load(Ordering::SeqCst), 2);

    // "No value" keeps the current setting
    line.set_line_width(None);
    line.set_dashed(None);
    assert_eq!(material.get().line_width, 1.0);
    assert!(!material.get().dashed);
    assert_eq!(applied.load(Ordering::SeqCst), 2);

    line.set_dashed(Some(true));
    assert_eq!(
        material.get(),
        LineMaterial {
            color: "red".to_owned(),
            line_width: 1.0,
            dashed: true,
        }
    );
    assert_eq!(applied.load(Ordering::SeqCst), 3);
    assert_eq!(line.store.selection_count(), 3);
}
