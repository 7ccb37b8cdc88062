//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observed state and
//! effects. It owns the dependency graph, the effect arena and the
//! active-effect stack.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime's arena.
//!
//! 2. While an effect runs, every intercepted read calls [`Runtime::track`],
//!    which records a `(target, key, read kind)` edge for the active effect
//!    and remembers the edge in the effect's cleanup list.
//!
//! 3. Every intercepted write calls [`Runtime::trigger`], which:
//!    a. Looks up the read kinds the write invalidates
//!    b. Collects the subscribed effects in first-subscription order
//!    c. Skips the effect that is currently running (self-trigger guard)
//!    d. Hands each effect to its scheduler, or re-runs it synchronously
//!
//! 4. Before every run, an effect's old edges are removed so that the new
//!    run records exactly the dependencies of the code path it took.
//!
//! # Graph Layout
//!
//! ```text
//! TargetId -> Option<Key> -> TrackOp -> IndexSet<EffectId>
//! ```
//!
//! The `None` key is the synthetic iterate key shared by all enumeration
//! reads of a target. Subscription sets hold ids, not effects, so the graph
//! never keeps an effect alive; the arena does, until the effect is
//! disposed.
//!
//! # Threading
//!
//! Handles are `Send + Sync`, but a runtime is meant to be driven from one
//! thread at a time. [`Runtime::current`] returns a per-thread default
//! runtime, so independent threads never share an active-effect stack.
//! No runtime lock is held while user code runs.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use smallvec::SmallVec;

use super::context::TrackingPause;
use super::effect::{EffectRunner, Runnable};
use super::id::{EffectId, TargetId};
use super::operations::{TrackOp, TriggerOp};
use crate::object::{Key, ReactiveCache};

/// One recorded dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub target: TargetId,
    pub op: TrackOp,
    /// `None` for iterate dependencies.
    pub key: Option<Key>,
}

/// Events reported to an inspector installed with
/// [`Runtime::set_inspector`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DebugEvent {
    /// A new dependency edge was recorded for `effect`.
    Track { effect: EffectId, dependency: Dependency },
    /// A write notified the graph. Reported for every call, whether or not
    /// anything was subscribed.
    Trigger { target: TargetId, op: TriggerOp, key: Key },
}

/// Callback receiving [`DebugEvent`]s.
pub type Inspector = Arc<dyn Fn(&DebugEvent) + Send + Sync>;

type SubscriptionSet = IndexSet<EffectId>;
type TargetDeps = HashMap<Option<Key>, HashMap<TrackOp, SubscriptionSet>>;

struct EffectSlot {
    effect: Arc<dyn Runnable>,
    /// Cleanup list: every subscription set this effect belongs to.
    deps: SmallVec<[Dependency; 4]>,
}

#[derive(Default)]
pub(crate) struct RuntimeState {
    targets: HashMap<TargetId, TargetDeps>,
    effects: HashMap<EffectId, EffectSlot>,
    pub(crate) stack: Vec<EffectId>,
    pub(crate) pause_depth: usize,
}

impl RuntimeState {
    fn cleanup(&mut self, effect: EffectId) {
        let deps = match self.effects.get_mut(&effect) {
            Some(slot) => std::mem::take(&mut slot.deps),
            None => return,
        };

        for dep in deps {
            let Some(keys) = self.targets.get_mut(&dep.target) else {
                continue;
            };
            if let Some(kinds) = keys.get_mut(&dep.key) {
                if let Some(set) = kinds.get_mut(&dep.op) {
                    set.shift_remove(&effect);
                    if set.is_empty() {
                        kinds.remove(&dep.op);
                    }
                }
                if kinds.is_empty() {
                    keys.remove(&dep.key);
                }
            }
            if keys.is_empty() {
                self.targets.remove(&dep.target);
            }
        }
    }
}

pub(crate) struct RuntimeInner {
    pub(crate) state: Mutex<RuntimeState>,
    pub(crate) cache: ReactiveCache,
    inspector: RwLock<Option<Inspector>>,
}

/// A reactive runtime: one dependency graph plus its effects.
///
/// Cloning a `Runtime` clones the handle; all clones share one graph.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

thread_local! {
    static CURRENT: Runtime = Runtime::new();
}

impl Runtime {
    /// Create an isolated runtime.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                state: Mutex::new(RuntimeState::default()),
                cache: ReactiveCache::new(),
                inspector: RwLock::new(None),
            }),
        }
    }

    /// The default runtime of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(Runtime::clone)
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Install a callback that observes every recorded dependency and every
    /// trigger.
    pub fn set_inspector<F>(&self, inspector: F)
    where
        F: Fn(&DebugEvent) + Send + Sync + 'static,
    {
        *self.inner.inspector.write() = Some(Arc::new(inspector));
    }

    /// Remove the inspector.
    pub fn clear_inspector(&self) {
        *self.inner.inspector.write() = None;
    }

    fn inspect(&self, event: &DebugEvent) {
        let inspector = self.inner.inspector.read().clone();
        if let Some(inspector) = inspector {
            inspector(event);
        }
    }

    /// Record that the active effect depends on `(target, key, op)`.
    ///
    /// Does nothing when tracking is paused or no effect is running.
    /// Iterate reads ignore `key` and use the shared iterate key. Recording
    /// the same edge twice is a no-op.
    pub fn track(&self, target: TargetId, op: TrackOp, key: Option<&Key>) {
        let event = {
            let mut state = self.inner.state.lock();
            if state.pause_depth > 0 {
                return;
            }
            let Some(&effect) = state.stack.last() else {
                return;
            };
            if !state.effects.contains_key(&effect) {
                // Disposed while running.
                return;
            }

            let key = match op {
                TrackOp::Iterate => None,
                TrackOp::Get | TrackOp::Has => key.cloned(),
            };
            let inserted = state
                .targets
                .entry(target)
                .or_default()
                .entry(key.clone())
                .or_default()
                .entry(op)
                .or_default()
                .insert(effect);
            if !inserted {
                return;
            }

            let dependency = Dependency { target, op, key };
            if let Some(slot) = state.effects.get_mut(&effect) {
                slot.deps.push(dependency.clone());
            }
            DebugEvent::Track { effect, dependency }
        };

        if let DebugEvent::Track { effect, dependency } = &event {
            tracing::trace!(
                %effect,
                target = %dependency.target,
                op = %dependency.op,
                key = ?dependency.key,
                "track"
            );
        }
        self.inspect(&event);
    }

    /// Notify the graph that `key` of `target` was written.
    ///
    /// Every effect subscribed through a read kind the write invalidates is
    /// re-run once, in first-subscription order; structural writes also
    /// reach iterate subscribers. The currently running effect is skipped.
    pub fn trigger(&self, target: TargetId, op: TriggerOp, key: &Key) {
        tracing::trace!(%target, %op, %key, "trigger");
        self.inspect(&DebugEvent::Trigger {
            target,
            op,
            key: key.clone(),
        });

        for effect in self.collect_effects(target, op, key) {
            // An earlier effect in this fan-out may have disposed it.
            if effect.is_disposed() {
                continue;
            }
            match effect.scheduler() {
                Some(scheduler) => scheduler(EffectRunner::new(Arc::clone(&effect))),
                None => effect.run_triggered(),
            }
        }
    }

    fn collect_effects(
        &self,
        target: TargetId,
        op: TriggerOp,
        key: &Key,
    ) -> Vec<Arc<dyn Runnable>> {
        let state = self.inner.state.lock();
        let Some(keys) = state.targets.get(&target) else {
            return Vec::new();
        };

        let mut ids = IndexSet::new();
        let mut collect = |dep_key: &Option<Key>| {
            if let Some(kinds) = keys.get(dep_key) {
                for kind in op.invalidates() {
                    if let Some(set) = kinds.get(kind) {
                        ids.extend(set.iter().copied());
                    }
                }
            }
        };
        collect(&Some(key.clone()));
        if op.is_structural() {
            collect(&None);
        }

        let active = state.stack.last().copied();
        ids.into_iter()
            .filter(|id| Some(*id) != active)
            .filter_map(|id| state.effects.get(&id).map(|slot| Arc::clone(&slot.effect)))
            .collect()
    }

    /// Suspend tracking. Pauses nest: tracking resumes only once every
    /// pause has been matched by a [`resume_tracking`](Self::resume_tracking).
    pub fn pause_tracking(&self) {
        self.inner.state.lock().pause_depth += 1;
    }

    /// Undo one [`pause_tracking`](Self::pause_tracking).
    pub fn resume_tracking(&self) {
        let mut state = self.inner.state.lock();
        if state.pause_depth == 0 {
            drop(state);
            tracing::warn!("resume_tracking called without a matching pause_tracking");
            return;
        }
        state.pause_depth -= 1;
    }

    /// Pause tracking until the returned guard is dropped.
    pub fn pause(&self) -> TrackingPause {
        TrackingPause::new(self)
    }

    /// Run `f` with tracking paused.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.pause();
        f()
    }

    /// Whether a read right now would record a dependency.
    pub fn is_tracking(&self) -> bool {
        let state = self.inner.state.lock();
        state.pause_depth == 0 && !state.stack.is_empty()
    }

    /// The effect currently running, if any.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.state.lock().stack.last().copied()
    }

    /// The effects currently subscribed to `(target, key, op)`, in
    /// subscription order.
    pub fn dependents(&self, target: TargetId, op: TrackOp, key: Option<&Key>) -> Vec<EffectId> {
        let key = match op {
            TrackOp::Iterate => None,
            TrackOp::Get | TrackOp::Has => key.cloned(),
        };
        let state = self.inner.state.lock();
        state
            .targets
            .get(&target)
            .and_then(|keys| keys.get(&key))
            .and_then(|kinds| kinds.get(&op))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live (registered, not disposed) effects.
    pub fn effect_count(&self) -> usize {
        self.inner.state.lock().effects.len()
    }

    /// Number of targets with at least one subscriber.
    pub fn observed_target_count(&self) -> usize {
        self.inner.state.lock().targets.len()
    }

    pub(crate) fn register(&self, effect: Arc<dyn Runnable>) {
        let id = effect.id();
        self.inner.state.lock().effects.insert(
            id,
            EffectSlot {
                effect,
                deps: SmallVec::new(),
            },
        );
    }

    /// Remove `effect` from every subscription set it belongs to.
    pub(crate) fn cleanup(&self, effect: EffectId) {
        self.inner.state.lock().cleanup(effect);
    }

    /// Unsubscribe `effect` and drop it from the arena.
    pub(crate) fn dispose(&self, effect: EffectId) {
        let slot = {
            let mut state = self.inner.state.lock();
            state.cleanup(effect);
            state.effects.remove(&effect)
        };
        // The effect body may own handles whose drop re-enters the runtime.
        drop(slot);
    }

    /// Fire DELETE for every index in `dropped` after a sequence shrank.
    /// `occupied` lists the dropped indices that held a value.
    ///
    /// A hole nobody subscribes to is only visible to an inspector or to
    /// effects iterating `target`. Without either, such holes are skipped,
    /// so truncating a huge sparse sequence costs what it actually held.
    pub(crate) fn trigger_truncation(
        &self,
        target: TargetId,
        dropped: Range<usize>,
        occupied: Vec<usize>,
    ) {
        if self.inner.inspector.read().is_some() || self.is_iterated(target) {
            for index in dropped {
                self.trigger(target, TriggerOp::Delete, &Key::Index(index));
            }
            return;
        }

        let mut indices = occupied;
        indices.extend(self.observed_indices(target, dropped));
        indices.sort_unstable();
        indices.dedup();
        for index in indices {
            self.trigger(target, TriggerOp::Delete, &Key::Index(index));
        }
    }

    fn is_iterated(&self, target: TargetId) -> bool {
        self.inner
            .state
            .lock()
            .targets
            .get(&target)
            .is_some_and(|keys| keys.contains_key(&None))
    }

    /// Positional keys of `target` within `range` that some effect
    /// subscribes to.
    fn observed_indices(&self, target: TargetId, range: Range<usize>) -> Vec<usize> {
        let state = self.inner.state.lock();
        let Some(keys) = state.targets.get(&target) else {
            return Vec::new();
        };
        keys.keys()
            .filter_map(|key| match key {
                Some(Key::Index(i)) if range.contains(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn dependencies_of(&self, effect: EffectId) -> Vec<Dependency> {
        self.inner
            .state
            .lock()
            .effects
            .get(&effect)
            .map(|slot| slot.deps.to_vec())
            .unwrap_or_default()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Runtime")
            .field("effects", &state.effects.len())
            .field("observed_targets", &state.targets.len())
            .field("stack_depth", &state.stack.len())
            .field("pause_depth", &state.pause_depth)
            .finish()
    }
}
