//! Reactive Handles
//!
//! A [`Reactive`] wraps a [`Container`] and intercepts every access to it.
//! Reads record dependencies, writes trigger them, and the container itself
//! does the storing.
//!
//! # Reads
//!
//! | operation          | records                            |
//! |--------------------|------------------------------------|
//! | [`Reactive::get`]  | GET on the key                     |
//! | [`Reactive::has`]  | HAS on the key                     |
//! | [`Reactive::keys`] | ITERATE on the container           |
//! | [`Reactive::len`]  | GET `length`, or ITERATE on records |
//!
//! Container values are returned wrapped, through the runtime's cache, so
//! nested state is observed lazily and a nested container always comes
//! back as the same handle. Accessors run with the handle as their
//! receiver, so the properties they read are tracked too.
//!
//! # Writes
//!
//! [`Reactive::set`] triggers ADD for new keys and SET for existing keys
//! whose value changed (same-value comparison). On sequences the implicit
//! `length` is kept in step: growing the sequence by writing an index
//! triggers SET `length`, and shrinking it by writing `length` triggers
//! DELETE for every index that fell off the end.
//!
//! [`Reactive::delete`] triggers DELETE only if a key was actually removed.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::ser::{Serialize, Serializer};

use super::container::{Container, ContainerKind};
use super::value::{Key, PropertyRead, Value};
use crate::error::Result;
use crate::reactive::{Runtime, TargetId, TrackOp, TriggerOp};

pub(crate) struct ReactiveInner {
    pub(crate) raw: Container,
    pub(crate) runtime: Runtime,
}

impl Drop for ReactiveInner {
    fn drop(&mut self) {
        self.runtime.inner.cache.evict(self.raw.id());
    }
}

/// An observed view of a [`Container`].
///
/// Handles are cheap to clone. Two handles compare equal only if they came
/// from the same cache entry.
#[derive(Clone)]
pub struct Reactive {
    pub(crate) inner: Arc<ReactiveInner>,
}

impl Reactive {
    pub(crate) fn new(raw: Container, runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(ReactiveInner { raw, runtime }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ReactiveInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ReactiveInner> {
        Arc::downgrade(&self.inner)
    }

    /// The wrapped container. Accesses through it are not observed.
    pub fn to_raw(&self) -> Container {
        self.inner.raw.clone()
    }

    /// Identity of the wrapped container.
    pub fn id(&self) -> TargetId {
        self.inner.raw.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.raw.kind()
    }

    pub fn is_sequence(&self) -> bool {
        self.inner.raw.is_sequence()
    }

    /// The runtime this handle reports to.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Read a property.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.inner.runtime.track(self.id(), TrackOp::Get, Some(&key));

        let value = match self.inner.raw.slot(&key) {
            Value::Accessor(accessor) => accessor.call(self),
            value => value,
        };
        self.inner.runtime.wrap(value)
    }

    /// Whether a property is present.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.inner.runtime.track(self.id(), TrackOp::Has, Some(&key));
        self.inner.raw.has_own(&key)
    }

    /// The present keys. Sequences list occupied indices only.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.runtime.track(self.id(), TrackOp::Iterate, None);
        self.inner.raw.keys()
    }

    /// Sequence length, or the number of record keys.
    pub fn len(&self) -> usize {
        match self.kind() {
            ContainerKind::Sequence => self.get(Key::length()).as_length().unwrap_or(0),
            ContainerKind::Record => {
                self.inner.runtime.track(self.id(), TrackOp::Iterate, None);
                self.inner.raw.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a property and notify dependents.
    ///
    /// A failed write leaves the container untouched and triggers nothing.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let raw = &self.inner.raw;
        let runtime = &self.inner.runtime;
        let target = raw.id();

        let probe = raw.probe(&key);
        let truncated = match value.as_length() {
            Some(len) if key.is_length() => raw.indices_from(len),
            _ => Vec::new(),
        };
        raw.write(&key, value.clone())?;
        let new_len = raw.sequence_len();

        let op = if probe.existed { TriggerOp::Set } else { TriggerOp::Add };
        if op == TriggerOp::Add || probe.old.has_changed(&value) {
            runtime.trigger(target, op, &key);
        }

        if let (Some(old_len), Some(new_len)) = (probe.len, new_len) {
            if key.is_length() {
                if new_len < old_len {
                    runtime.trigger_truncation(target, new_len..old_len, truncated);
                }
            } else if new_len != old_len {
                runtime.trigger(target, TriggerOp::Set, &Key::length());
            }
        }
        Ok(())
    }

    /// Read a property, transform it and write it back. The read is tracked.
    pub fn update(&self, key: impl Into<Key>, f: impl FnOnce(Value) -> Value) -> Result<()> {
        let key = key.into();
        let next = f(self.get(key.clone()));
        self.set(key, next)
    }

    /// Remove a property and notify dependents. Returns whether something
    /// was removed.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        let raw = &self.inner.raw;
        let existed = raw.has_own(&key);
        let removed = raw.remove(&key)?;
        if existed && removed {
            self.inner.runtime.trigger(raw.id(), TriggerOp::Delete, &key);
        }
        Ok(removed)
    }

    /// Length of the wrapped sequence without tracking.
    pub(crate) fn raw_len(&self) -> usize {
        self.inner.raw.len()
    }
}

impl PropertyRead for Reactive {
    fn read(&self, key: &Key) -> Value {
        self.get(key)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.id())
            .field("raw", &self.inner.raw)
            .finish()
    }
}

/// Serializes the wrapped container without tracking.
impl Serialize for Reactive {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.raw.serialize(serializer)
    }
}
