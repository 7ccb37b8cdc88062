//! Reactive Handle Cache
//!
//! Each runtime keeps at most one live [`Reactive`] per container, so
//! wrapping the same container twice yields the same handle. Entries are
//! weak: the cache never keeps a handle or its container alive, and a
//! handle evicts its own entry when the last clone is dropped.

use std::sync::Weak;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::container::Container;
use super::proxy::{Reactive, ReactiveInner};
use super::value::Value;
use crate::reactive::{Runtime, TargetId};

pub(crate) struct ReactiveCache {
    handles: DashMap<TargetId, Weak<ReactiveInner>>,
}

impl ReactiveCache {
    pub(crate) fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    fn get_or_wrap(&self, container: &Container, runtime: &Runtime) -> Reactive {
        match self.handles.entry(container.id()) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(inner) => Reactive::from_inner(inner),
                None => {
                    let handle = Reactive::new(container.clone(), runtime.clone());
                    entry.insert(handle.downgrade());
                    handle
                }
            },
            Entry::Vacant(entry) => {
                let handle = Reactive::new(container.clone(), runtime.clone());
                entry.insert(handle.downgrade());
                tracing::trace!(target = %container.id(), "wrapped container");
                handle
            }
        }
    }

    /// Drop the entry for `id` unless a live handle replaced it.
    pub(crate) fn evict(&self, id: TargetId) {
        self.handles.remove_if(&id, |_, handle| handle.strong_count() == 0);
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

impl Runtime {
    /// The reactive handle for `container`, created on first use.
    pub fn reactive(&self, container: &Container) -> Reactive {
        self.inner.cache.get_or_wrap(container, self)
    }

    /// Wrap a value for handing out: containers become reactive handles,
    /// everything else (handles included) passes through unchanged.
    pub fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Container(container) => Value::Reactive(self.reactive(&container)),
            value => value,
        }
    }

    /// Number of live reactive handles.
    pub fn reactive_count(&self) -> usize {
        self.inner.cache.len()
    }
}
