//! Sequence Methods
//!
//! Reactive sequences expose a fixed set of instrumented methods. Each one
//! first records a GET dependency on its own name, then follows one of two
//! policies:
//!
//! - **Search** (`includes`, `index_of`, `last_index_of`): scan the wrapped
//!   elements with tracking on. Callers usually hold raw values, which never
//!   compare equal to the wrapped ones, so a miss is retried against the
//!   raw elements.
//! - **Mutate** (`push`, `pop`, `shift`, `unshift`, `splice`): run with
//!   tracking paused. These methods read `length` and shuffle elements
//!   internally; tracking those reads would make an effect that pushes
//!   depend on `length` and re-trigger itself forever. Writes still go
//!   through the handle, so dependents are notified of every element and
//!   `length` change.
//!
//! Mutators move raw slot contents, so wrapped handles are never stored
//! into raw storage.

use std::fmt;
use std::str::FromStr;

use super::container::Container;
use super::proxy::Reactive;
use super::value::{Key, Value};
use crate::error::{ReactiveError, Result};
use crate::reactive::TrackOp;

/// How an instrumented method is intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodPolicy {
    /// Tracked scan over wrapped elements, retried over raw ones.
    Search,
    /// Runs with tracking paused.
    Mutate,
}

/// The instrumented sequence methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceMethod {
    Includes,
    IndexOf,
    LastIndexOf,
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
}

impl SequenceMethod {
    pub const ALL: [SequenceMethod; 8] = [
        SequenceMethod::Includes,
        SequenceMethod::IndexOf,
        SequenceMethod::LastIndexOf,
        SequenceMethod::Push,
        SequenceMethod::Pop,
        SequenceMethod::Shift,
        SequenceMethod::Unshift,
        SequenceMethod::Splice,
    ];

    /// The property name the method is tracked under.
    pub const fn name(self) -> &'static str {
        match self {
            SequenceMethod::Includes => "includes",
            SequenceMethod::IndexOf => "indexOf",
            SequenceMethod::LastIndexOf => "lastIndexOf",
            SequenceMethod::Push => "push",
            SequenceMethod::Pop => "pop",
            SequenceMethod::Shift => "shift",
            SequenceMethod::Unshift => "unshift",
            SequenceMethod::Splice => "splice",
        }
    }

    pub const fn policy(self) -> MethodPolicy {
        match self {
            SequenceMethod::Includes | SequenceMethod::IndexOf | SequenceMethod::LastIndexOf => {
                MethodPolicy::Search
            }
            SequenceMethod::Push
            | SequenceMethod::Pop
            | SequenceMethod::Shift
            | SequenceMethod::Unshift
            | SequenceMethod::Splice => MethodPolicy::Mutate,
        }
    }

    pub fn key(self) -> Key {
        Key::from(self.name())
    }
}

impl fmt::Display for SequenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SequenceMethod {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        SequenceMethod::ALL
            .into_iter()
            .find(|method| method.name() == s)
            .ok_or_else(|| ReactiveError::UnknownMethod { name: s.to_string() })
    }
}

/// One scan of a search method over some view of the sequence.
fn scan(
    method: SequenceMethod,
    len: usize,
    present: impl Fn(usize) -> bool,
    at: impl Fn(usize) -> Value,
    needle: &Value,
) -> Option<usize> {
    match method {
        SequenceMethod::Includes => (0..len).find(|&i| at(i).same_value_zero(needle)),
        SequenceMethod::IndexOf => (0..len).find(|&i| present(i) && at(i).strict_equals(needle)),
        SequenceMethod::LastIndexOf => (0..len)
            .rev()
            .find(|&i| present(i) && at(i).strict_equals(needle)),
        _ => None,
    }
}

impl Reactive {
    fn intercept<R>(
        &self,
        method: SequenceMethod,
        body: impl FnOnce(&Self) -> Result<R>,
    ) -> Result<R> {
        let runtime = self.runtime();
        runtime.track(self.id(), TrackOp::Get, Some(&method.key()));
        if !self.is_sequence() {
            return Err(ReactiveError::NotSequential { method });
        }

        match method.policy() {
            MethodPolicy::Search => body(self),
            MethodPolicy::Mutate => {
                let _pause = runtime.pause();
                body(self)
            }
        }
    }

    fn search(&self, method: SequenceMethod, needle: &Value) -> Result<Option<usize>> {
        self.intercept(method, |this| {
            let found = scan(method, this.len(), |i| this.has(i), |i| this.get(i), needle);
            if found.is_some() {
                return Ok(found);
            }

            let raw = this.to_raw();
            Ok(scan(method, raw.len(), |i| raw.has(i), |i| raw.get(i), needle))
        })
    }

    /// Move the raw contents of slot `from` into slot `to`, or empty `to`
    /// if `from` is a hole.
    fn move_slot(&self, from: usize, to: usize) -> Result<()> {
        let raw = &self.inner.raw;
        let from = Key::Index(from);
        if raw.has_own(&from) {
            self.set(to, raw.slot(&from))
        } else {
            self.delete(to).map(|_| ())
        }
    }

    /// Whether the sequence contains `needle`. `NaN` is found.
    pub fn includes(&self, needle: impl Into<Value>) -> Result<bool> {
        let needle = needle.into();
        self.search(SequenceMethod::Includes, &needle)
            .map(|found| found.is_some())
    }

    /// First index holding `needle`.
    pub fn index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>> {
        self.search(SequenceMethod::IndexOf, &needle.into())
    }

    /// Last index holding `needle`.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>> {
        self.search(SequenceMethod::LastIndexOf, &needle.into())
    }

    /// Append values. Returns the new length.
    pub fn push<I, V>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.intercept(SequenceMethod::Push, |this| {
            let mut len = this.raw_len();
            for value in values {
                this.set(len, value)?;
                len += 1;
            }
            this.set(Key::length(), len)?;
            Ok(len)
        })
    }

    /// Remove and return the last element, or undefined if empty.
    pub fn pop(&self) -> Result<Value> {
        self.intercept(SequenceMethod::Pop, |this| {
            let len = this.raw_len();
            if len == 0 {
                this.set(Key::length(), 0usize)?;
                return Ok(Value::Undefined);
            }

            let last = len - 1;
            let value = this.get(last);
            this.delete(last)?;
            this.set(Key::length(), last)?;
            Ok(value)
        })
    }

    /// Remove and return the first element, or undefined if empty.
    pub fn shift(&self) -> Result<Value> {
        self.intercept(SequenceMethod::Shift, |this| {
            let len = this.raw_len();
            if len == 0 {
                this.set(Key::length(), 0usize)?;
                return Ok(Value::Undefined);
            }

            let first = this.get(0usize);
            for k in 1..len {
                this.move_slot(k, k - 1)?;
            }
            this.delete(len - 1)?;
            this.set(Key::length(), len - 1)?;
            Ok(first)
        })
    }

    /// Prepend values. Returns the new length.
    pub fn unshift<I, V>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.intercept(SequenceMethod::Unshift, |this| {
            let len = this.raw_len();
            let count = items.len();
            if count > 0 {
                for k in (0..len).rev() {
                    this.move_slot(k, k + count)?;
                }
                for (j, item) in items.into_iter().enumerate() {
                    this.set(j, item)?;
                }
            }
            let new_len = len + count;
            this.set(Key::length(), new_len)?;
            Ok(new_len)
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `items` in their place. Returns the removed elements; holes come back
    /// as undefined.
    ///
    /// `start` and `delete_count` are clamped to the sequence.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.intercept(SequenceMethod::Splice, |this| {
            let len = this.raw_len();
            let start = start.min(len);
            let delete_count = delete_count.min(len - start);
            let count = items.len();

            let removed: Vec<Value> = (start..start + delete_count).map(|i| this.get(i)).collect();

            if count < delete_count {
                for k in start..(len - delete_count) {
                    this.move_slot(k + delete_count, k + count)?;
                }
                for k in ((len - delete_count + count)..len).rev() {
                    this.delete(k)?;
                }
            } else if count > delete_count {
                for k in (start..(len - delete_count)).rev() {
                    this.move_slot(k + delete_count, k + count)?;
                }
            }

            for (j, item) in items.into_iter().enumerate() {
                this.set(start + j, item)?;
            }
            this.set(Key::length(), len - delete_count + count)?;
            Ok(removed)
        })
    }

    /// Call a method by name with dynamic arguments.
    ///
    /// Search methods take the needle as their first argument and return a
    /// boolean or an index (`-1` when absent). `splice` takes
    /// `start, delete_count, ...items`; a missing `delete_count` removes
    /// everything from `start`, and the removed elements come back as a new
    /// plain sequence.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method: SequenceMethod = name.parse()?;
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let position = |index: Option<usize>| index.map_or(Value::from(-1), Value::from);

        match method {
            SequenceMethod::Includes => self.includes(arg(0)).map(Value::from),
            SequenceMethod::IndexOf => self.index_of(arg(0)).map(position),
            SequenceMethod::LastIndexOf => self.last_index_of(arg(0)).map(position),
            SequenceMethod::Push => self.push(args.iter().cloned()).map(Value::from),
            SequenceMethod::Pop => self.pop(),
            SequenceMethod::Shift => self.shift(),
            SequenceMethod::Unshift => self.unshift(args.iter().cloned()).map(Value::from),
            SequenceMethod::Splice => {
                let start = arg(0).as_length().unwrap_or(0);
                let delete_count = match args.get(1) {
                    Some(count) => count.as_length().unwrap_or(0),
                    None => usize::MAX,
                };
                self.splice(start, delete_count, args.iter().skip(2).cloned())
                    .map(|removed| Value::from(Container::from_values(removed)))
            }
        }
    }
}
