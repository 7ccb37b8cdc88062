//! Computed Implementation
//!
//! A Computed is a derived value that caches its result. It is built on a
//! lazy effect whose scheduler, instead of re-running the getter, marks the
//! cached value stale and notifies whoever read the computed.
//!
//! # States
//!
//! - **Dirty**: the cached value may be stale. The next read re-runs the
//!   getter. Every computed starts dirty.
//! - **Clean**: the cached value is current and reads return a clone.
//!
//! # Propagation
//!
//! ```text
//! source write -> getter effect scheduler -> dirty = true
//!                                         -> trigger (computed, SET, "value")
//!                                         -> effects that read the computed re-run
//!                                         -> their read recomputes the getter
//! ```
//!
//! Reading a computed records a GET dependency on `(computed, "value")`, so
//! a computed inside a computed works the same way.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::effect::{Effect, EffectOptions};
use super::id::TargetId;
use super::operations::{TrackOp, TriggerOp};
use super::runtime::Runtime;
use crate::object::Key;

/// Write handler of a computed value.
pub type Setter<T> = Arc<dyn Fn(T) + Send + Sync>;

struct ComputedInner<T> {
    id: TargetId,
    runtime: Runtime,
    effect: Effect<T>,
    value: RwLock<Option<T>>,
    dirty: AtomicBool,
    setter: Setter<T>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
        self.runtime.trigger(self.id, TriggerOp::Set, &Key::value());
    }

    fn evaluate(&self) -> T {
        if !self.dirty.load(Ordering::Acquire) {
            if let Some(value) = self.value.read().as_ref() {
                return value.clone();
            }
        }

        let value = self.effect.run();
        *self.value.write() = Some(value.clone());
        self.dirty.store(false, Ordering::Release);
        value
    }
}

fn read_only<T: 'static>(id: TargetId) -> Setter<T> {
    Arc::new(move |_: T| {
        tracing::warn!(computed = %id, "write to a computed value without a setter was ignored");
    })
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.dispose();
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = create_ref(2);
/// let source = count.clone();
/// let doubled = computed(move || source.get() * 2);
///
/// assert_eq!(doubled.get(), 4);  // Computes
/// assert_eq!(doubled.get(), 4);  // Cached
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10); // Recomputes
/// ```
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a read-only computed on the current thread's default runtime.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Runtime::current().computed(getter)
    }

    /// Create a writable computed on the current thread's default runtime.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Runtime::current().computed_with_setter(getter, setter)
    }

    fn build<F>(runtime: &Runtime, getter: F, setter: Option<Setter<T>>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = TargetId::new();
        let setter = setter.unwrap_or_else(|| read_only(id));

        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let options = EffectOptions::new().lazy(true).scheduler(move |_runner| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });

            ComputedInner {
                id,
                runtime: runtime.clone(),
                effect: runtime.effect_with(getter, options),
                value: RwLock::new(None),
                dirty: AtomicBool::new(true),
                setter,
            }
        });

        Self { inner }
    }

    /// The computed's identity in the dependency graph.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the value, recomputing if dirty, and record a dependency.
    pub fn get(&self) -> T {
        self.inner
            .runtime
            .track(self.inner.id, TrackOp::Get, Some(&Key::value()));
        self.inner.evaluate()
    }

    /// Get the value, recomputing if dirty, without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.evaluate()
    }

    /// Hand `value` to the setter. Without a setter this only logs a warning.
    pub fn set(&self, value: T) {
        (self.inner.setter)(value);
    }

    /// Whether the next read will re-run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.load(Ordering::Acquire))
            .field("runs", &self.inner.effect.run_count())
            .finish()
    }
}

impl Runtime {
    /// Create a read-only computed on this runtime.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computed::build(self, getter, None)
    }

    /// Create a writable computed on this runtime.
    pub fn computed_with_setter<T, F, S>(&self, getter: F, setter: S) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Computed::build(self, getter, Some(Arc::new(setter)))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
