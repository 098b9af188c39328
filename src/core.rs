//! The single dispatch seam every RPC-exposed object implements.
//!
//! Rust has no runtime reflection over "enumerable own properties" or ad
//! hoc method names, so the dynamic member surface the handle proxy
//! exposes to callers is realized on the callee side as one trait with one
//! method: a single generic `invoke(name, args)` entry point that every
//! RPC-exposed type implements. The seam across which dispatch is
//! type-erased uses [`downcast_rs`] so that implementors can still recover
//! their concrete type when they hold an `Rc<dyn Invocable>` of their own.

use downcast_rs::{impl_downcast, Downcast};
use futures::future::LocalBoxFuture;

use crate::error::CallError;
use crate::value::Value;

/// An object that can be exposed over the RPC fabric.
///
/// Implementors dispatch on `member` themselves and are responsible for
/// returning [`CallError::NoMember`] or [`CallError::NotCallable`] exactly
/// as a dynamic implementation would from its proxy layer. The handle
/// proxy itself only enforces the private-member naming convention before
/// ever reaching `invoke`.
pub trait Invocable: Downcast {
    /// Invokes `member` with `args`, returning the marshalled result.
    fn invoke(&self, member: &str, args: Vec<Value>) -> LocalBoxFuture<'_, Result<Value, CallError>>;
}

impl_downcast!(Invocable);
