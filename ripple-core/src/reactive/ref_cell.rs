//! Ref Implementation
//!
//! A Ref is a single observable cell. It holds one value under the
//! pseudo-key `value` and participates in the dependency graph like any
//! other target.
//!
//! # How Refs Work
//!
//! 1. [`Ref::get`] records a GET dependency on `(ref, "value")` for the
//!    active effect.
//!
//! 2. [`Ref::set`] stores the new value and triggers SET on
//!    `(ref, "value")`, even when the value did not change. Refs hold
//!    arbitrary Rust values, so there is no comparison to skip on.
//!
//! # Thread Safety
//!
//! The value is protected by a `parking_lot::RwLock`. The lock is never
//! held while effects run.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::id::TargetId;
use super::operations::{TrackOp, TriggerOp};
use super::runtime::Runtime;
use crate::object::Key;

struct RefInner<T> {
    id: TargetId,
    value: RwLock<T>,
    runtime: Runtime,
}

/// An observable single-value cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = create_ref(0);
///
/// let observed = count.clone();
/// effect(move || println!("count is {}", observed.get()));
///
/// count.set(5);  // Prints: "count is 5"
/// ```
pub struct Ref<T> {
    inner: Arc<RefInner<T>>,
}

impl<T> Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a ref on the current thread's default runtime.
    pub fn new(value: T) -> Self {
        Runtime::current().create_ref(value)
    }

    /// The ref's identity in the dependency graph.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value, recording a dependency.
    pub fn get(&self) -> T {
        self.inner
            .runtime
            .track(self.inner.id, TrackOp::Get, Some(&Key::value()));
        self.inner.value.read().clone()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replace the value and notify dependents.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.inner
            .runtime
            .trigger(self.inner.id, TriggerOp::Set, &Key::value());
    }

    /// Read, transform and write back. The read is tracked like [`get`](Self::get).
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.get());
        self.set(next);
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

impl Runtime {
    /// Create a ref on this runtime.
    pub fn create_ref<T>(&self, value: T) -> Ref<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ref {
            inner: Arc::new(RefInner {
                id: TargetId::new(),
                value: RwLock::new(value),
                runtime: self.clone(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn ref_get_and_set() {
        let runtime = Runtime::new();
        let cell = runtime.create_ref(0);

        assert_eq!(cell.get(), 0);
        cell.set(5);
        assert_eq!(cell.get(), 5);
        assert_eq!(cell.get_untracked(), 5);
    }

    #[test]
    fn ref_update() {
        let runtime = Runtime::new();
        let cell = runtime.create_ref(10);

        cell.update(|v| v * 2);
        assert_eq!(cell.get(), 20);
    }

    #[test]
    fn ref_reruns_dependents() {
        let runtime = Runtime::new();
        let cell = runtime.create_ref(1);
        let seen = Arc::new(AtomicI32::new(0));
        let sink = seen.clone();
        let observed = cell.clone();

        let effect = runtime.effect(move || sink.store(observed.get(), Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        cell.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        // Same value still triggers
        cell.set(2);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let runtime = Runtime::new();
        let cell = runtime.create_ref(String::from("a"));
        let observed = cell.clone();

        let effect = runtime.effect(move || observed.get_untracked().len());
        assert_eq!(effect.dependency_count(), 0);

        cell.set(String::from("bb"));
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn ref_clone_shares_state() {
        let runtime = Runtime::new();
        let ref1 = runtime.create_ref(7);
        let ref2 = ref1.clone();

        assert_eq!(ref1.id(), ref2.id());
        ref1.set(8);
        assert_eq!(ref2.get(), 8);
    }
}
