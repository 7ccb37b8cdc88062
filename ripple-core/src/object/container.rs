//! Plain Containers
//!
//! A [`Container`] is the raw, unobserved state that a [`Reactive`] handle
//! wraps. Containers are shared and identity-bearing: cloning a
//! `Container` clones the handle, not the data, and every container gets a
//! unique [`TargetId`] that keys it in the dependency graph.
//!
//! # Variants
//!
//! A container is tagged with its capability at creation:
//!
//! - [`ContainerKind::Record`]: insertion-ordered named properties, which
//!   may include [`Accessor`] getters.
//! - [`ContainerKind::Sequence`]: positional slots plus the implicit
//!   `length` property. Slots can be empty (holes): writing past the end
//!   grows the sequence and leaves holes behind, and deleting an index
//!   empties the slot without shifting anything. Storage is sparse, so a
//!   hole costs nothing and any length up to `u32::MAX` is representable.
//!
//! The methods on `Container` never track or trigger. They are what the
//! interception layer delegates to.
//!
//! [`Reactive`]: super::Reactive

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::value::{Accessor, Key, PropertyRead, Value, MAX_INDEX};
use crate::error::{ReactiveError, Result};
use crate::reactive::TargetId;

/// The capability tag of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Record,
    Sequence,
}

enum ContainerData {
    Record(IndexMap<Key, Value>),
    Sequence(Slots),
}

/// Sparse sequence storage: occupied slots by index, plus the length.
#[derive(Default)]
struct Slots {
    items: BTreeMap<usize, Value>,
    len: usize,
}

impl Slots {
    fn insert(&mut self, index: usize, value: Value) {
        self.items.insert(index, value);
        self.len = self.len.max(index + 1);
    }

    fn set_len(&mut self, len: usize) {
        drop(self.items.split_off(&len));
        self.len = len;
    }
}

impl<V: Into<Value>> FromIterator<V> for Slots {
    fn from_iter<I: IntoIterator<Item = V>>(values: I) -> Self {
        let items: BTreeMap<usize, Value> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i, v.into()))
            .collect();
        let len = items.len();
        Self { items, len }
    }
}

struct ContainerInner {
    id: TargetId,
    kind: ContainerKind,
    data: RwLock<ContainerData>,
}

/// What a write is about to replace, captured before the write happens.
pub(crate) struct WriteProbe {
    /// Whether the key existed before the write.
    pub existed: bool,
    /// The raw value previously stored under the key.
    pub old: Value,
    /// The sequence length before the write, for sequences.
    pub len: Option<usize>,
}

/// A shared, identity-bearing keyed collection.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    fn with_data(kind: ContainerKind, data: ContainerData) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: TargetId::new(),
                kind,
                data: RwLock::new(data),
            }),
        }
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::with_data(ContainerKind::Record, ContainerData::Record(IndexMap::new()))
    }

    /// Create an empty sequence.
    pub fn sequence() -> Self {
        Self::with_data(ContainerKind::Sequence, ContainerData::Sequence(Slots::default()))
    }

    /// Create a record from key/value pairs. Later duplicates win.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_data(ContainerKind::Record, ContainerData::Record(map))
    }

    /// Create a sequence from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let slots = values.into_iter().collect();
        Self::with_data(ContainerKind::Sequence, ContainerData::Sequence(slots))
    }

    /// The container's identity in the dependency graph.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.kind
    }

    pub fn is_sequence(&self) -> bool {
        self.inner.kind == ContainerKind::Sequence
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Define a getter property on a record.
    pub fn define_accessor(&self, key: impl Into<Key>, accessor: Accessor) -> Result<()> {
        let key = key.into();
        match &mut *self.inner.data.write() {
            ContainerData::Record(map) => {
                map.insert(key, Value::Accessor(accessor));
                Ok(())
            }
            ContainerData::Sequence(_) => Err(ReactiveError::AccessorOnSequence { key }),
        }
    }

    /// Read a property. Accessors are evaluated with this container as the
    /// receiver; missing keys read as [`Value::Undefined`].
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self.slot(&key.into()) {
            Value::Accessor(accessor) => accessor.call(self),
            value => value,
        }
    }

    /// Whether a key is present.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.has_own(&key.into())
    }

    /// The present keys: record keys in insertion order, or the occupied
    /// indices of a sequence.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.inner.data.read() {
            ContainerData::Record(map) => map.keys().cloned().collect(),
            ContainerData::Sequence(slots) => slots.items.keys().map(|&i| Key::Index(i)).collect(),
        }
    }

    /// Sequence length, or the number of record keys.
    pub fn len(&self) -> usize {
        match &*self.inner.data.read() {
            ContainerData::Record(map) => map.len(),
            ContainerData::Sequence(slots) => slots.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a property without notifying anyone.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        self.write(&key.into(), value.into())
    }

    /// Remove a property without notifying anyone. Returns whether
    /// something was removed.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        self.remove(&key.into())
    }

    /// The raw stored value, accessors left unevaluated.
    pub(crate) fn slot(&self, key: &Key) -> Value {
        match &*self.inner.data.read() {
            ContainerData::Record(map) => map.get(key).cloned().unwrap_or_default(),
            ContainerData::Sequence(slots) => match key {
                Key::Index(i) => slots.items.get(i).cloned().unwrap_or_default(),
                k if k.is_length() => Value::from(slots.len),
                _ => Value::Undefined,
            },
        }
    }

    pub(crate) fn has_own(&self, key: &Key) -> bool {
        match &*self.inner.data.read() {
            ContainerData::Record(map) => map.contains_key(key),
            ContainerData::Sequence(slots) => match key {
                Key::Index(i) => slots.items.contains_key(i),
                k => k.is_length(),
            },
        }
    }

    pub(crate) fn sequence_len(&self) -> Option<usize> {
        match &*self.inner.data.read() {
            ContainerData::Record(_) => None,
            ContainerData::Sequence(slots) => Some(slots.len),
        }
    }

    /// Occupied sequence indices at or past `start`, ascending.
    pub(crate) fn indices_from(&self, start: usize) -> Vec<usize> {
        match &*self.inner.data.read() {
            ContainerData::Record(_) => Vec::new(),
            ContainerData::Sequence(slots) => slots.items.range(start..).map(|(&i, _)| i).collect(),
        }
    }

    pub(crate) fn probe(&self, key: &Key) -> WriteProbe {
        WriteProbe {
            existed: self.has_own(key),
            old: self.slot(key),
            len: self.sequence_len(),
        }
    }

    pub(crate) fn write(&self, key: &Key, value: Value) -> Result<()> {
        match &mut *self.inner.data.write() {
            ContainerData::Record(map) => {
                if let Some(Value::Accessor(_)) = map.get(key) {
                    return Err(ReactiveError::ReadOnlyProperty { key: key.clone() });
                }
                map.insert(key.clone(), value);
                Ok(())
            }
            ContainerData::Sequence(slots) => {
                if let Value::Accessor(_) = value {
                    return Err(ReactiveError::AccessorOnSequence { key: key.clone() });
                }
                match key {
                    Key::Index(i) if *i <= MAX_INDEX => {
                        slots.insert(*i, value);
                        Ok(())
                    }
                    k if k.is_length() => {
                        let len = value.as_length().ok_or_else(|| ReactiveError::InvalidLength {
                            value: format!("{value:?}"),
                        })?;
                        slots.set_len(len);
                        Ok(())
                    }
                    _ => Err(ReactiveError::InvalidSequenceKey { key: key.clone() }),
                }
            }
        }
    }

    pub(crate) fn remove(&self, key: &Key) -> Result<bool> {
        match &mut *self.inner.data.write() {
            ContainerData::Record(map) => Ok(map.shift_remove(key).is_some()),
            ContainerData::Sequence(slots) => match key {
                Key::Index(i) => Ok(slots.items.remove(i).is_some()),
                k if k.is_length() => Err(ReactiveError::ReadOnlyProperty { key: k.clone() }),
                _ => Ok(false),
            },
        }
    }
}

impl PropertyRead for Container {
    fn read(&self, key: &Key) -> Value {
        self.get(key)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("len", &self.len())
            .finish()
    }
}

enum Snapshot {
    Record(Vec<(Key, Value)>),
    Sequence { len: usize, items: Vec<(usize, Value)> },
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Snapshot first so no lock is held while nested containers serialize.
        let snapshot = match &*self.inner.data.read() {
            ContainerData::Record(map) => {
                Snapshot::Record(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            ContainerData::Sequence(slots) => Snapshot::Sequence {
                len: slots.len,
                items: slots.items.iter().map(|(&i, v)| (i, v.clone())).collect(),
            },
        };

        match snapshot {
            Snapshot::Record(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in &entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Snapshot::Sequence { len, items } => {
                // Holes serialize as null.
                let mut seq = serializer.serialize_seq(Some(len))?;
                let mut items = items.iter().peekable();
                for index in 0..len {
                    match items.next_if(|(i, _)| *i == index) {
                        Some((_, item)) => seq.serialize_element(item)?,
                        None => seq.serialize_element(&Value::Null)?,
                    }
                }
                seq.end()
            }
        }
    }
}
