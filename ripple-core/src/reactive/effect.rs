//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the observed state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect re-runs, or is handed to its
//!    scheduler if it has one.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution. Branches not taken in the latest run stop
//!    waking the effect.
//!
//! # Return Values
//!
//! The body may return a value. [`Effect::run`] hands it back to the
//! caller; runs started by the runtime discard it. Computed values are
//! built on lazy effects that return their result this way.
//!
//! # Schedulers
//!
//! A scheduler receives an [`EffectRunner`] instead of the effect running
//! synchronously. It decides when (and whether) to call
//! [`EffectRunner::run`]. See [`JobQueue`](super::JobQueue) for a
//! deduplicating deferred queue.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::context::ReactiveContext;
use super::id::EffectId;
use super::runtime::{Dependency, Runtime, RuntimeInner};

/// Callback that receives triggered effects in place of running them.
pub type Scheduler = Arc<dyn Fn(EffectRunner) + Send + Sync>;

/// The runtime's view of an effect, independent of its return type.
pub(crate) trait Runnable: Send + Sync {
    fn id(&self) -> EffectId;

    fn scheduler(&self) -> Option<&Scheduler>;

    fn is_disposed(&self) -> bool;

    /// Run as a result of a trigger. Disposed effects do nothing.
    fn run_triggered(&self);
}

/// Options for [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run. The effect has no dependencies until it is
    /// first run by hand.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Route triggered runs through `scheduler`.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(EffectRunner) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

/// A handle a scheduler uses to run a triggered effect later.
#[derive(Clone)]
pub struct EffectRunner {
    effect: Arc<dyn Runnable>,
}

impl EffectRunner {
    pub(crate) fn new(effect: Arc<dyn Runnable>) -> Self {
        Self { effect }
    }

    /// The effect this runner belongs to.
    pub fn id(&self) -> EffectId {
        self.effect.id()
    }

    /// Run the effect with dependency tracking. Does nothing if the effect
    /// was disposed in the meantime.
    pub fn run(&self) {
        self.effect.run_triggered();
    }
}

impl fmt::Debug for EffectRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRunner").field("effect", &self.id()).finish()
    }
}

struct EffectInner<T> {
    id: EffectId,
    body: Box<dyn Fn() -> T + Send + Sync>,
    scheduler: Option<Scheduler>,
    runtime: Weak<RuntimeInner>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl<T> EffectInner<T> {
    fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade().map(|inner| Runtime { inner })
    }

    fn execute(&self) -> T {
        let Some(runtime) = self.runtime() else {
            return (self.body)();
        };
        if self.disposed.load(Ordering::Acquire) {
            // Disposed effects still compute; their reads attach to nobody.
            return runtime.untracked(|| (self.body)());
        }

        // Clear old dependencies
        runtime.cleanup(self.id);

        let _ctx = ReactiveContext::enter(&runtime, self.id);
        self.run_count.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(effect = %self.id, "running effect");
        (self.body)()
    }
}

impl<T> Runnable for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn run_triggered(&self) {
        if self.is_disposed() {
            return;
        }
        let _ = self.execute();
    }
}

/// A computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Container::from_pairs([("count", 0)]));
/// let state = state.as_reactive().unwrap().clone();
///
/// let observer = state.clone();
/// let effect = effect(move || {
///     println!("count is {:?}", observer.get("count"));
/// });
///
/// state.set("count", 5)?;  // Prints: "count is Number(5.0)"
/// ```
pub struct Effect<T> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn register<F>(runtime: &Runtime, body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: EffectId::new(),
            body: Box::new(body),
            scheduler: options.scheduler,
            runtime: Arc::downgrade(&runtime.inner),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        runtime.register(inner.clone());

        tracing::debug!(
            effect = %inner.id,
            lazy = options.lazy,
            scheduled = inner.scheduler.is_some(),
            "registered effect"
        );

        let effect = Self { inner };
        if !options.lazy {
            // Run immediately to establish dependencies
            let _ = effect.run();
        }
        effect
    }

    /// A runner for this effect, as a scheduler would receive it.
    pub fn runner(&self) -> EffectRunner {
        EffectRunner::new(self.inner.clone())
    }
}

impl<T> Effect<T> {
    /// Run the body now, re-collecting dependencies, and return its result.
    ///
    /// A disposed effect still runs its body but records nothing.
    pub fn run(&self) -> T {
        self.inner.execute()
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Unsubscribe from everything and stop reacting to triggers.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.inner.runtime() {
            runtime.dispose(self.inner.id);
        }
        tracing::debug!(effect = %self.inner.id, "disposed effect");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// The dependencies recorded by the latest run, in the order they were
    /// first read.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner
            .runtime()
            .map(|runtime| runtime.dependencies_of(self.inner.id))
            .unwrap_or_default()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies().len()
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Runtime {
    /// Create an effect on this runtime and run it once.
    pub fn effect<T, F>(&self, body: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Effect::register(self, body, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    pub fn effect_with<T, F>(&self, body: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Effect::register(self, body, options)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
