//! Integration Tests for Reactive System
//!
//! These tests verify that containers, effects, refs and computed values
//! work together correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::{
    computed, create_ref, effect, pause_tracking, reactive, resume_tracking, Accessor, Container,
    DebugEvent, Dependency, EffectOptions, JobQueue, Key, PropertyRead, Reactive, Runtime, TrackOp,
    TriggerOp, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn num(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

/// Collects the trigger events a runtime reports.
fn record_triggers(runtime: &Runtime) -> Arc<Mutex<Vec<(TriggerOp, Key)>>> {
    let triggers = Arc::new(Mutex::new(Vec::new()));
    let sink = triggers.clone();
    runtime.set_inspector(move |event| {
        if let DebugEvent::Trigger { op, key, .. } = event {
            sink.lock().push((*op, key.clone()));
        }
    });
    triggers
}

/// Wrapping the same container twice, or wrapping a handle, yields the same handle.
#[test]
fn wrapping_is_stable_and_idempotent() {
    let raw = Container::from_pairs([("a", 1)]);

    let first = reactive(raw.clone());
    let second = reactive(raw.clone());
    assert_eq!(first, second);
    assert_eq!(reactive(first.clone()), first);

    let handle = first.as_reactive().unwrap();
    assert!(handle.to_raw().ptr_eq(&raw));
    assert_eq!(num(&handle.get("a")), 1.0);
}

/// Reads inside an effect record one GET per key, in read order.
#[test]
fn reads_record_dependencies_in_order() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1), ("b", 2)]));
    let observed = state.clone();

    let effect = runtime.effect(move || num(&observed.get("a")) + num(&observed.get("b")));

    assert_eq!(
        effect.dependencies(),
        vec![
            Dependency {
                target: state.id(),
                op: TrackOp::Get,
                key: Some(Key::from("a")),
            },
            Dependency {
                target: state.id(),
                op: TrackOp::Get,
                key: Some(Key::from("b")),
            },
        ]
    );
}

/// A computed getter runs once until its inputs change, then once more.
#[test]
fn computed_recomputes_once_per_change() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1), ("b", 2)]));
    let (calls, calls_clone) = counter();
    let source = state.clone();

    let sum = runtime.computed(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        num(&source.get("a")) + num(&source.get("b"))
    });

    assert_eq!(sum.get(), 3.0);
    assert_eq!(sum.get(), 3.0);
    assert_eq!(sum.get(), 3.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // state.a++
    state.update("a", |v| Value::from(num(&v) + 1.0)).unwrap();

    assert_eq!(sum.get(), 4.0);
    assert_eq!(sum.get(), 4.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Branches not taken in the latest run no longer trigger the effect.
#[test]
fn conditional_branch_drops_stale_dependency() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1), ("b", 2), ("c", 3)]));
    let (runs, runs_clone) = counter();
    let observed = state.clone();

    runtime.effect(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        if num(&observed.get("a")) == 1.0 {
            observed.get("b")
        } else {
            observed.get("c")
        }
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("a", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    state.set("b", 20).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    state.set("c", 30).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// An effect that increments what it reads does not re-trigger itself.
#[test]
fn self_increment_does_not_recurse() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1)]));
    let observed = state.clone();

    let effect = runtime.effect(move || {
        observed.update("a", |v| Value::from(num(&v) + 1.0)).unwrap();
    });
    assert_eq!(effect.run_count(), 1);
    assert_eq!(num(&state.to_raw().get("a")), 2.0);

    state.set("a", 10).unwrap();
    assert_eq!(effect.run_count(), 2);
    assert_eq!(num(&state.to_raw().get("a")), 11.0);
}

/// Shrinking a sequence's length reports the length change and every dropped index.
#[test]
fn length_shrink_fires_three_triggers() {
    let runtime = Runtime::new();
    let list = runtime.reactive(&Container::from_values([1, 2, 3]));
    let triggers = record_triggers(&runtime);

    list.set(Key::length(), 1).unwrap();

    let triggers = triggers.lock();
    assert_eq!(triggers.len(), 3);
    assert!(triggers.contains(&(TriggerOp::Set, Key::length())));
    assert!(triggers.contains(&(TriggerOp::Delete, Key::Index(1))));
    assert!(triggers.contains(&(TriggerOp::Delete, Key::Index(2))));
}

/// Writing past the end adds the index and grows the length.
#[test]
fn out_of_bounds_write_fires_add_and_length() {
    let runtime = Runtime::new();
    let list = runtime.reactive(&Container::from_values([1, 2]));
    let triggers = record_triggers(&runtime);

    list.set(4usize, 5).unwrap();

    assert_eq!(
        *triggers.lock(),
        vec![(TriggerOp::Add, Key::Index(4)), (TriggerOp::Set, Key::length())]
    );
    assert_eq!(list.to_raw().len(), 5);
}

/// `push` inside an effect does not make the effect depend on `length`.
#[test]
fn push_does_not_track_length() {
    let runtime = Runtime::new();
    let list = runtime.reactive(&Container::from_values([1, 2]));
    let triggers = record_triggers(&runtime);
    let observed = list.clone();

    let effect = runtime.effect(move || observed.push([3]).unwrap());

    assert_eq!(
        effect.dependencies(),
        vec![Dependency {
            target: list.id(),
            op: TrackOp::Get,
            key: Some(Key::from("push")),
        }]
    );
    assert_eq!(
        *triggers.lock(),
        vec![(TriggerOp::Add, Key::Index(2)), (TriggerOp::Set, Key::length())]
    );
    assert_eq!(effect.run_count(), 1);
}

/// Mutators still notify effects that read the sequence.
#[test]
fn mutators_notify_readers() {
    let runtime = Runtime::new();
    let list = runtime.reactive(&Container::from_values([1, 2]));
    let observed = list.clone();
    let length = Arc::new(AtomicUsize::new(0));
    let sink = length.clone();

    let reader = runtime.effect(move || sink.store(observed.len(), Ordering::SeqCst));

    list.push([3, 4]).unwrap();
    assert_eq!(length.load(Ordering::SeqCst), 4);

    list.pop().unwrap();
    assert_eq!(length.load(Ordering::SeqCst), 3);

    list.splice(0, 3, Vec::<Value>::new()).unwrap();
    assert_eq!(length.load(Ordering::SeqCst), 0);
    assert!(reader.run_count() >= 4);
}

/// Two effects that both push to one sequence do not trigger each other forever.
#[test]
fn pushing_effects_do_not_loop() {
    let runtime = Runtime::new();
    let list = runtime.reactive(&Container::sequence());
    let (first, second) = (list.clone(), list.clone());

    let a = runtime.effect(move || first.push([1]).unwrap());
    let b = runtime.effect(move || second.push([2]).unwrap());

    assert_eq!(a.run_count(), 1);
    assert_eq!(b.run_count(), 1);
    assert_eq!(list.to_raw().len(), 2);
}

/// Reads attribute to the innermost running effect.
#[test]
fn nested_effects_track_separately() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1), ("b", 1)]));
    let (outer_runs, outer_clone) = counter();
    let (inner_runs, inner_clone) = counter();
    let children = Arc::new(Mutex::new(Vec::new()));

    let observed = state.clone();
    let rt = runtime.clone();
    let keep = children.clone();
    let outer = runtime.effect(move || {
        outer_clone.fetch_add(1, Ordering::SeqCst);
        let inner_state = observed.clone();
        let inner_count = inner_clone.clone();
        let child = rt.effect(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            inner_state.get("b")
        });
        keep.lock().push(child);
        observed.get("a")
    });

    assert_eq!(outer.dependency_count(), 1);
    assert_eq!(outer.dependencies()[0].key, Some(Key::from("a")));

    state.set("b", 2).unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 2);

    state.set("a", 2).unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
    assert_eq!(children.lock().len(), 2);
    assert!(runtime.active_effect().is_none());
}

/// Effects subscribed to the same key run in subscription order.
#[test]
fn trigger_runs_in_subscription_order() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1)]));
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut effects = Vec::new();
    for name in ["first", "second", "third"] {
        let observed = state.clone();
        let log = order.clone();
        effects.push(runtime.effect(move || {
            observed.get("a");
            log.lock().push(name);
        }));
    }
    order.lock().clear();

    state.set("a", 2).unwrap();
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

/// A lazy effect runs only when asked and hands back its result.
#[test]
fn lazy_effect_runs_on_demand() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("n", 2)]));
    let observed = state.clone();

    let effect = runtime.effect_with(
        move || num(&observed.get("n")) * 10.0,
        EffectOptions::new().lazy(true),
    );

    assert_eq!(effect.run_count(), 0);
    state.set("n", 3).unwrap();
    assert_eq!(effect.run_count(), 0);

    assert_eq!(effect.run(), 30.0);
    state.set("n", 4).unwrap();
    assert_eq!(effect.run_count(), 2);
}

/// A queue scheduler coalesces repeated triggers into one run.
#[test]
fn job_queue_coalesces_triggers() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("n", 0)]));
    let queue = JobQueue::new();
    let observed = state.clone();
    let last = Arc::new(Mutex::new(0.0));
    let sink = last.clone();

    let effect = runtime.effect_with(
        move || *sink.lock() = num(&observed.get("n")),
        EffectOptions::new().scheduler(queue.scheduler()),
    );

    for n in 1..=5 {
        state.set("n", n).unwrap();
    }
    assert_eq!(effect.run_count(), 1);
    assert_eq!(queue.flush(), 1);
    assert_eq!(*last.lock(), 5.0);
}

/// Nested pauses need matching resumes before reads are tracked again.
#[test]
fn nested_pause_and_resume() {
    let state = reactive(Container::from_pairs([("a", 1), ("b", 1), ("c", 1)]));
    let state = state.as_reactive().unwrap().clone();
    let observed = state.clone();

    let effect = effect(move || {
        pause_tracking();
        pause_tracking();
        observed.get("a");
        resume_tracking();
        observed.get("b");
        resume_tracking();
        observed.get("c");
    });

    let keys: Vec<_> = effect.dependencies().into_iter().map(|d| d.key).collect();
    assert_eq!(keys, vec![Some(Key::from("c"))]);

    state.set("a", 2).unwrap();
    state.set("b", 2).unwrap();
    assert_eq!(effect.run_count(), 1);
    state.set("c", 2).unwrap();
    assert_eq!(effect.run_count(), 2);
}

/// A panicking effect leaves the active-effect stack as it found it.
#[test]
fn panicking_effect_restores_stack() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1)]));
    let observed = state.clone();

    let effect = runtime.effect(move || {
        if num(&observed.get("a")) == 2.0 {
            panic!("effect failed");
        }
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        state.set("a", 2).unwrap();
    }));
    assert!(result.is_err());
    assert!(runtime.active_effect().is_none());
    assert!(!runtime.is_tracking());

    // Still subscribed through the read made before the panic
    state.set("a", 3).unwrap();
    assert_eq!(effect.run_count(), 3);
}

/// Disposed effects stop reacting.
#[test]
fn disposed_effect_stops_firing() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1)]));
    let (runs, runs_clone) = counter();
    let observed = state.clone();

    let effect = runtime.effect(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        observed.get("a")
    });
    effect.dispose();

    state.set("a", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(runtime.dependents(state.id(), TrackOp::Get, Some(&Key::from("a"))).is_empty());
}

/// Enumeration depends on the key set, not on values.
#[test]
fn iteration_ignores_value_updates() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([("a", 1)]));
    let observed = state.clone();

    let effect = runtime.effect(move || observed.keys().len());

    state.set("a", 2).unwrap();
    assert_eq!(effect.run_count(), 1);

    state.set("b", 1).unwrap();
    assert_eq!(effect.run_count(), 2);

    state.delete("a").unwrap();
    assert_eq!(effect.run_count(), 3);
}

/// `has` is invalidated by adds and deletes, not by updates.
#[test]
fn has_tracks_existence() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::record());
    let observed = state.clone();

    let effect = runtime.effect(move || observed.has("a"));

    state.set("a", 1).unwrap();
    state.set("a", 2).unwrap();
    state.delete("a").unwrap();
    assert_eq!(effect.run_count(), 3);
}

/// Properties read inside an accessor are tracked.
#[test]
fn accessor_reads_are_tracked() {
    let runtime = Runtime::new();
    let raw = Container::from_pairs([("first", "Ada"), ("last", "Lovelace")]);
    raw.define_accessor(
        "full",
        Accessor::new(|this| {
            let first = this.read(&Key::from("first"));
            let last = this.read(&Key::from("last"));
            Value::from(format!(
                "{} {}",
                first.as_str().unwrap_or_default(),
                last.as_str().unwrap_or_default()
            ))
        }),
    )
    .unwrap();

    let state = runtime.reactive(&raw);
    let observed = state.clone();
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    runtime.effect(move || {
        *sink.lock() = observed.get("full").as_str().unwrap_or_default().to_string();
    });
    assert_eq!(*seen.lock(), "Ada Lovelace");

    state.set("first", "Augusta").unwrap();
    assert_eq!(*seen.lock(), "Augusta Lovelace");

    // Accessors are read-only
    assert!(state.set("full", "x").is_err());
}

/// Nested containers are observed at every level.
#[test]
fn nested_containers_are_tracked() {
    let runtime = Runtime::new();
    let state = runtime.reactive(&Container::from_pairs([(
        "nested",
        Container::from_pairs([("num", 0)]),
    )]));
    let observed = state.clone();
    let seen = Arc::new(Mutex::new(0.0));
    let sink = seen.clone();

    runtime.effect(move || {
        let nested = observed.get("nested");
        *sink.lock() = nested.as_reactive().map(|n| num(&n.get("num"))).unwrap_or(-1.0);
    });

    let nested: Reactive = state.get("nested").as_reactive().unwrap().clone();
    nested.set("num", 8).unwrap();
    assert_eq!(*seen.lock(), 8.0);

    state.set("nested", Container::from_pairs([("num", 3)])).unwrap();
    assert_eq!(*seen.lock(), 3.0);
}

/// Search methods find raw elements and are tracked.
#[test]
fn search_methods_are_tracked() {
    let runtime = Runtime::new();
    let item = Container::record();
    let list =
        runtime.reactive(&Container::from_values([Value::from(1), Value::from(item.clone())]));
    let observed = list.clone();
    let found = Arc::new(Mutex::new(None));
    let sink = found.clone();

    runtime.effect(move || *sink.lock() = observed.index_of(3).unwrap());
    assert_eq!(*found.lock(), None);

    list.set(0usize, 3).unwrap();
    assert_eq!(*found.lock(), Some(0));

    assert_eq!(list.index_of(item).unwrap(), Some(1));
}

/// Refs notify on every write.
#[test]
fn ref_drives_effects() {
    let count = create_ref(0);
    let observed = count.clone();
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let sink = seen.clone();

    effect(move || sink.store(observed.get(), Ordering::SeqCst));
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    count.update(|v| v + 1);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

/// Effects re-run through a chain of computed values.
#[test]
fn computed_chain_drives_effects() {
    let state = reactive(Container::from_pairs([("n", 1)]));
    let state = state.as_reactive().unwrap().clone();

    let source = state.clone();
    let doubled = computed(move || num(&source.get("n")) * 2.0);
    let inner = doubled.clone();
    let plus_one = computed(move || inner.get() + 1.0);

    let view = plus_one.clone();
    let seen = Arc::new(Mutex::new(0.0));
    let sink = seen.clone();
    let effect = effect(move || *sink.lock() = view.get());
    assert_eq!(*seen.lock(), 3.0);

    state.set("n", 5).unwrap();
    assert_eq!(*seen.lock(), 11.0);
    assert_eq!(effect.run_count(), 2);
}

/// Writing a computed without a setter is a logged no-op.
#[test]
fn computed_without_setter_ignores_writes() {
    init_tracing();
    let runtime = Runtime::new();
    let value = runtime.computed(|| 1);
    value.set(5);
    assert_eq!(value.get(), 1);
}

/// State built from JSON serializes back to the same JSON.
#[test]
fn json_snapshot_round_trip() {
    let runtime = Runtime::new();
    let initial = serde_json::json!({ "todos": [{ "title": "write", "done": false }], "count": 1 });
    let raw = Value::from(initial);
    let state = runtime.wrap(raw);
    let state = state.as_reactive().unwrap();

    let todos = state.get("todos");
    let todos = todos.as_reactive().unwrap();
    todos
        .push([Value::from(serde_json::json!({ "title": "test", "done": true }))])
        .unwrap();
    state.set("count", 2).unwrap();

    assert_eq!(
        serde_json::to_value(state).unwrap(),
        serde_json::json!({
            "todos": [
                { "title": "write", "done": false },
                { "title": "test", "done": true }
            ],
            "count": 2
        })
    );
}

/// Separate runtimes do not see each other's effects.
#[test]
fn runtimes_are_isolated() {
    let raw = Container::from_pairs([("a", 1)]);
    let left = Runtime::new();
    let right = Runtime::new();

    let observed = left.reactive(&raw);
    let effect = left.effect(move || observed.get("a"));

    right.reactive(&raw).set("a", 2).unwrap();
    assert_eq!(effect.run_count(), 1);

    left.reactive(&raw).set("a", 3).unwrap();
    assert_eq!(effect.run_count(), 2);
}
