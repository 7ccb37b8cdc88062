//! Error types for container operations.
//!
//! Only structural misuse is an error. Writes that change nothing, and
//! deletes of absent keys, are silent no-ops; writing to a computed value
//! without a setter is a logged warning.

use thiserror::Error;

use crate::object::{Key, SequenceMethod};

/// Errors returned by container and reactive handle operations.
///
/// An operation that fails never triggers any effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// The property cannot be written or removed.
    #[error("property `{key}` is read-only")]
    ReadOnlyProperty { key: Key },

    /// Sequences only accept positional keys and `length`.
    #[error("key `{key}` is not valid for a sequence")]
    InvalidSequenceKey { key: Key },

    /// A sequence length must be a non-negative integer that fits in a `u32`.
    #[error("invalid sequence length: {value}")]
    InvalidLength { value: String },

    /// A sequence method was invoked on a record.
    #[error("`{method}` requires a sequence")]
    NotSequential { method: SequenceMethod },

    /// Dynamic dispatch named a method that does not exist.
    #[error("unknown sequence method `{name}`")]
    UnknownMethod { name: String },

    /// Accessors can only live on records.
    #[error("cannot store accessor `{key}` in a sequence")]
    AccessorOnSequence { key: Key },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
