//! Reactive Core
//!
//! This module implements the dependency graph and the primitives built on
//! it: effects, refs and computed values. Reactive containers live in
//! [`crate::object`] and report their reads and writes here.
//!
//! # Concepts
//!
//! ## Tracking
//!
//! Every read of observed state inside a running effect records an edge
//! `(target, key, read kind) -> effect`. The read kinds are listed in
//! [`TrackOp`]: a plain property read, an existence check, or an
//! enumeration of keys.
//!
//! ## Triggering
//!
//! Every write notifies the graph with a [`TriggerOp`]. The write kind
//! decides which read kinds are stale: a value update only invalidates
//! reads of that key, while adding or removing a key also invalidates
//! existence checks and enumerations.
//!
//! ## Effects
//!
//! An [`Effect`] re-runs when anything it read changes. Dependencies are
//! re-collected on every run, so conditional reads are handled exactly.
//!
//! ## Refs and Computed Values
//!
//! A [`Ref`] is a single observable cell. A [`Computed`] is a cached
//! derived value that recomputes lazily after its inputs change.
//!
//! # Implementation Notes
//!
//! Each [`Runtime`] owns its graph and an active-effect stack. The free
//! functions in the crate root use a per-thread default runtime.

mod computed;
mod context;
mod effect;
mod id;
mod operations;
mod queue;
mod ref_cell;
mod runtime;

pub use computed::{Computed, Setter};
pub use context::TrackingPause;
pub use effect::{Effect, EffectOptions, EffectRunner, Scheduler};
pub use id::{EffectId, TargetId};
pub use operations::{TrackOp, TriggerOp};
pub use queue::JobQueue;
pub use ref_cell::Ref;
pub use runtime::{DebugEvent, Dependency, Inspector, Runtime};
