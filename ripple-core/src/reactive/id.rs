//! Identifiers for the reactive system.
//!
//! Two kinds of things participate in the dependency graph:
//!
//! - **Targets** are observed state: plain containers, `Ref` cells and
//!   `Computed` cells. Edges are keyed by the target's identity, never by
//!   its contents.
//! - **Effects** are the computations that depend on targets.
//!
//! Both are identified by process-unique integers drawn from atomic
//! counters, so ids from different runtimes never collide.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Unique identifier for an observed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Unique identifier for an effect.
///
/// Subscription sets store these instead of the effects themselves, which
/// keeps the state -> effect edges non-owning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}
