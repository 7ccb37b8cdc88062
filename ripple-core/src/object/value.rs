//! Values and Keys
//!
//! Observed containers hold dynamically typed [`Value`]s addressed by
//! [`Key`]s. Equality follows identity semantics wherever identity exists:
//! two containers are "the same" only if they are the same allocation, no
//! matter what they hold.
//!
//! Three comparison flavours are provided because different operations
//! need different answers for `NaN` and signed zero:
//!
//! | function              | `NaN == NaN` | `+0 == -0` | used by                      |
//! |-----------------------|--------------|------------|------------------------------|
//! | [`Value::same_value`] | yes          | no         | change detection on write    |
//! | [`Value::same_value_zero`] | yes     | yes        | `includes`                   |
//! | [`Value::strict_equals`]   | no      | yes        | `index_of` / `last_index_of` |

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use super::container::Container;
use super::proxy::Reactive;

/// Largest valid sequence index. Sequence lengths fit in a `u32`.
pub(crate) const MAX_INDEX: usize = u32::MAX as usize - 1;

/// A property key.
///
/// Canonical unsigned integer strings are normalized to [`Key::Index`], so
/// `Key::from("3") == Key::from(3)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A positional key.
    Index(usize),
    /// A named key.
    Name(Arc<str>),
}

impl Key {
    /// The sequence length key.
    pub fn length() -> Self {
        Key::Name(Arc::from("length"))
    }

    /// The implicit key of single-value cells.
    pub fn value() -> Self {
        Key::Name(Arc::from("value"))
    }

    /// Whether this is the sequence length key.
    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }

    /// The positional index, if this is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }
}

fn parse_index(s: &str) -> Option<usize> {
    // Only canonical forms: "0", "17", never "017" or "+1".
    if s.is_empty()
        || (s.len() > 1 && s.starts_with('0'))
        || !s.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    s.parse::<usize>().ok().filter(|i| *i <= MAX_INDEX)
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        match parse_index(s) {
            Some(i) => Key::Index(i),
            None => Key::Name(Arc::from(s)),
        }
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::from(s.as_str())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Read access to properties, used as the receiver of an [`Accessor`].
///
/// When an accessor is read through a [`Reactive`] handle the receiver is
/// that handle, so every property the accessor reads is tracked too.
pub trait PropertyRead {
    /// Read a property.
    fn read(&self, key: &Key) -> Value;
}

type AccessorFn = dyn Fn(&dyn PropertyRead) -> Value + Send + Sync;

/// A getter property, evaluated against the object it was read from.
#[derive(Clone)]
pub struct Accessor(Arc<AccessorFn>);

impl Accessor {
    /// Create an accessor from a getter.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&dyn PropertyRead) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(getter))
    }

    /// Evaluate the getter with the given receiver.
    pub fn call(&self, receiver: &dyn PropertyRead) -> Value {
        (self.0)(receiver)
    }

    /// Whether two accessors are the same getter.
    pub fn ptr_eq(&self, other: &Accessor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor(..)")
    }
}

/// A dynamically typed value stored in a container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value. Reading a missing key yields this.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// A plain, unobserved container.
    Container(Container),
    /// A reactive handle.
    Reactive(Reactive),
    /// A getter property.
    Accessor(Accessor),
}

impl Value {
    /// Object.is semantics: `NaN` equals itself, `+0` and `-0` differ.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.identity_eq(other),
        }
    }

    /// Like [`same_value`](Self::same_value) but `+0` equals `-0`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.identity_eq(other),
        }
    }

    /// Strict equality: `NaN` never equals anything.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.identity_eq(other),
        }
    }

    /// Whether writing `new` over `self` is an observable change.
    pub fn has_changed(&self, new: &Value) -> bool {
        !self.same_value(new)
    }

    fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            (Value::Accessor(a), Value::Accessor(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// Interpret this value as a sequence length.
    pub(crate) fn as_length(&self) -> Option<usize> {
        let n = self.as_f64()?;
        if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
            Some(n as usize)
        } else {
            None
        }
    }
}

/// Same-value equality, see [`Value::same_value`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<Accessor> for Value {
    fn from(a: Accessor) -> Self {
        Value::Accessor(a)
    }
}

/// Builds plain containers from JSON objects and arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Container(Container::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => Value::Container(Container::from_pairs(
                map.into_iter().map(|(k, v)| (Key::from(k), Value::from(v))),
            )),
        }
    }
}

/// Serializes a raw snapshot. Reactive handles serialize their raw
/// container; accessors and undefined serialize as null.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::Accessor(_) => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                let integral = n.fract() == 0.0 && n.abs() < i64::MAX as f64;
                if integral && !(*n == 0.0 && n.is_sign_negative()) {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Container(c) => c.serialize(serializer),
            Value::Reactive(r) => r.to_raw().serialize(serializer),
        }
    }
}
