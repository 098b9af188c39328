//! A capability-oriented RPC fabric for isolated "worlds" -- a parent
//! process and its spawned children, or peers communicating through a
//! parent -- to invoke methods on one another's objects as if local.
//!
//! Arguments, results, thrown errors and object references are marshalled
//! transparently across an opaque, full-duplex, ordered message transport
//! that this crate never opens itself (see [`transport`]). The moving
//! parts are a per-world [`registry`] of locally owned objects, a small
//! [`message`] protocol correlated by a [`dispatcher`], a [`marshal`]
//! depth guard standing in for cycle detection, a dynamic [`handle`]
//! proxy, and the [`world`] manager tying creation, routing and disposal
//! together.

#![warn(missing_docs, missing_debug_implementations)]

mod core;
mod dispatcher;
pub mod error;
pub mod handle;
mod marshal;
pub mod message;
mod registry;
pub mod transport;
pub mod value;
mod world;

pub use core::Invocable;
pub use error::{CallError, RpcError};
pub use handle::{Handle, ObjectId, WireRef, WorldId};
pub use message::{Message, WireError};
pub use transport::{Sender, TransportFactory};
pub use value::Value;
pub use world::World;

#[cfg(test)]
mod test;
