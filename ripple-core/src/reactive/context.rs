//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when an observed value is read,
//! the runtime registers the current effect as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] keeps a stack of running effects. Entering a context
//! pushes an effect onto the stack; dropping the guard pops it. Because the
//! pop happens in `Drop`, the stack is restored even if the effect panics.
//!
//! Nested effects work naturally: an effect created inside another effect
//! pushes itself on top and, once it returns, the outer effect is the
//! active one again.
//!
//! Entering a context also clears any tracking pause for the duration of
//! the run, so an effect triggered from inside a paused region still
//! collects its own dependencies.

use super::id::EffectId;
use super::runtime::Runtime;

/// Guard that pops the active effect when dropped.
pub(crate) struct ReactiveContext {
    runtime: Runtime,
    effect: EffectId,
    saved_pause_depth: usize,
}

impl ReactiveContext {
    /// Make `effect` the active effect of `runtime` until the guard drops.
    pub(crate) fn enter(runtime: &Runtime, effect: EffectId) -> Self {
        let saved_pause_depth = {
            let mut state = runtime.inner.state.lock();
            state.stack.push(effect);
            std::mem::replace(&mut state.pause_depth, 0)
        };

        Self {
            runtime: runtime.clone(),
            effect,
            saved_pause_depth,
        }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let mut state = self.runtime.inner.state.lock();
        let popped = state.stack.pop();
        state.pause_depth = self.saved_pause_depth;

        // Verify we're popping the right context.
        debug_assert_eq!(
            popped,
            Some(self.effect),
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.effect,
            popped
        );
    }
}

/// Pauses tracking on a runtime until dropped.
///
/// Created by [`Runtime::pause`]. Guards nest the same way
/// [`Runtime::pause_tracking`] calls do.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingPause {
    runtime: Runtime,
}

impl TrackingPause {
    pub(crate) fn new(runtime: &Runtime) -> Self {
        runtime.pause_tracking();
        Self {
            runtime: runtime.clone(),
        }
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        self.runtime.resume_tracking();
    }
}
