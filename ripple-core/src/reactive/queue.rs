//! Deferred Job Queue
//!
//! A [`JobQueue`] is a ready-made scheduler. Triggered effects are queued
//! instead of running, and [`JobQueue::flush`] runs them later in the order
//! they were first queued.
//!
//! An effect that is triggered several times before a flush is queued
//! once, so a burst of writes costs one re-run per affected effect:
//!
//! ```rust,ignore
//! let queue = JobQueue::new();
//! let effect = effect_with(body, EffectOptions::new().scheduler(queue.scheduler()));
//!
//! state.set("a", 1)?;
//! state.set("a", 2)?;
//! state.set("a", 3)?;
//! assert_eq!(queue.flush(), 1);
//! ```
//!
//! Effects triggered while flushing are appended and run in the same flush.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::effect::EffectRunner;
use super::id::EffectId;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<EffectRunner>,
    queued: HashSet<EffectId>,
}

/// A deduplicating queue of triggered effects.
#[derive(Clone, Default)]
pub struct JobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler that pushes onto this queue, for
    /// [`EffectOptions::scheduler`](super::EffectOptions::scheduler).
    pub fn scheduler(&self) -> impl Fn(EffectRunner) + Send + Sync + 'static {
        let queue = self.clone();
        move |runner| queue.push(runner)
    }

    /// Queue a runner unless its effect is already pending.
    pub fn push(&self, runner: EffectRunner) {
        let mut state = self.state.lock();
        if state.queued.insert(runner.id()) {
            state.pending.push_back(runner);
        }
    }

    /// Run everything pending. Returns the number of runs.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.pending.pop_front();
                if let Some(runner) = &next {
                    state.queued.remove(&runner.id());
                }
                next
            };

            match next {
                Some(runner) => {
                    runner.run();
                    ran += 1;
                }
                None => break,
            }
        }

        if ran > 0 {
            tracing::debug!(ran, "flushed job queue");
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("pending", &self.len()).finish()
    }
}
