//! Operation Taxonomy
//!
//! Every intercepted read is classified as a [`TrackOp`] and every
//! intercepted write as a [`TriggerOp`]. The table in
//! [`TriggerOp::invalidates`] decides which kinds of reads a write can
//! affect:
//!
//! | write    | invalidates            |
//! |----------|------------------------|
//! | `Set`    | `Get`                  |
//! | `Add`    | `Get`, `Has`, `Iterate`|
//! | `Delete` | `Get`, `Has`, `Iterate`|
//!
//! Replacing the value of an existing key cannot change which keys exist,
//! so a `Set` must never wake an effect that only enumerated keys.

use std::fmt;

use serde::Serialize;

/// The kind of read that created a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOp {
    /// Read of a specific key.
    Get,
    /// Existence check on a key.
    Has,
    /// Enumeration of keys. Not tied to any single key.
    Iterate,
}

/// The kind of write that invalidates dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOp {
    /// Mutation of an existing key.
    Set,
    /// Introduction of a new key.
    Add,
    /// Removal of a key.
    Delete,
}

impl TriggerOp {
    /// The read kinds invalidated by this write.
    pub const fn invalidates(self) -> &'static [TrackOp] {
        match self {
            TriggerOp::Set => &[TrackOp::Get],
            TriggerOp::Add | TriggerOp::Delete => &[TrackOp::Get, TrackOp::Has, TrackOp::Iterate],
        }
    }

    /// Whether this write changes the set of keys present.
    pub const fn is_structural(self) -> bool {
        matches!(self, TriggerOp::Add | TriggerOp::Delete)
    }
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackOp::Get => "get",
            TrackOp::Has => "has",
            TrackOp::Iterate => "iterate",
        })
    }
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerOp::Set => "set",
            TriggerOp::Add => "add",
            TriggerOp::Delete => "delete",
        })
    }
}
