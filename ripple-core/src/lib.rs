//! Ripple Core
//!
//! This crate provides a fine-grained reactive state runtime. Plain keyed
//! containers are wrapped in observing handles; computations that read
//! through those handles re-run automatically when the data they read
//! changes.
//!
//! It implements:
//!
//! - Reactive containers (records and sequences) with intercepted access
//! - Dependency tracking keyed by target, key and read kind
//! - Effects with optional laziness and custom schedulers
//! - Single-value refs and cached computed values
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: The runtime, dependency graph and reactive primitives
//! - `object`: Containers, values and the interception layer over them
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{computed, effect, reactive, Container};
//!
//! let state = reactive(Container::from_pairs([("count", 1)]));
//! let state = state.as_reactive().unwrap().clone();
//!
//! // Create a derived value
//! let source = state.clone();
//! let doubled = computed(move || source.get("count").as_f64().unwrap_or(0.0) * 2.0);
//!
//! // Create an effect
//! let view = doubled.clone();
//! effect(move || println!("doubled: {}", view.get()));
//!
//! // Update the state
//! state.set("count", 5)?;
//! // Effect automatically runs, prints: "doubled: 10"
//! ```
//!
//! The free functions use the calling thread's default [`Runtime`]. Create
//! a [`Runtime`] explicitly for an isolated graph.

pub mod error;
pub mod object;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use object::{
    Accessor, Container, ContainerKind, Key, MethodPolicy, PropertyRead, Reactive,
    SequenceMethod, Value,
};
pub use reactive::{
    Computed, DebugEvent, Dependency, Effect, EffectId, EffectOptions, EffectRunner, JobQueue, Ref,
    Runtime, TargetId, TrackOp, TriggerOp,
};

/// Wrap a value for observation on the default runtime.
///
/// Containers come back as [`Value::Reactive`]; reactive handles and
/// primitives come back unchanged.
pub fn reactive(value: impl Into<Value>) -> Value {
    Runtime::current().wrap(value.into())
}

/// Create an effect on the default runtime and run it once.
pub fn effect<T, F>(body: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Runtime::current().effect(body)
}

/// Create an effect with options on the default runtime.
pub fn effect_with<T, F>(body: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Runtime::current().effect_with(body, options)
}

/// Create a ref on the default runtime.
pub fn create_ref<T>(value: T) -> Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    Runtime::current().create_ref(value)
}

/// Create a read-only computed value on the default runtime.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Runtime::current().computed(getter)
}

/// Create a writable computed value on the default runtime.
pub fn computed_with_setter<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
{
    Runtime::current().computed_with_setter(getter, setter)
}

/// Pause tracking on the default runtime.
pub fn pause_tracking() {
    Runtime::current().pause_tracking();
}

/// Undo one [`pause_tracking`] on the default runtime.
pub fn resume_tracking() {
    Runtime::current().resume_tracking();
}

/// Run `f` without recording dependencies on the default runtime.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().untracked(f)
}
