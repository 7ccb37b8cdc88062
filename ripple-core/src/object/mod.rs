//! Observed Containers
//!
//! Plain [`Container`]s hold dynamically typed state. Wrapping one in a
//! [`Reactive`] handle routes every read and write through the runtime:
//! reads are tracked, writes trigger dependents, and nested containers are
//! wrapped lazily as they are read.
//!
//! Sequences additionally expose instrumented [`SequenceMethod`]s.

mod cache;
mod container;
mod methods;
mod proxy;
mod value;

pub(crate) use cache::ReactiveCache;
pub use container::{Container, ContainerKind};
pub use methods::{MethodPolicy, SequenceMethod};
pub use proxy::Reactive;
pub use value::{Accessor, Key, PropertyRead, Value};
