//! Handles: the proxy surface exposed to user code, and the wire reference
//! they marshal to.

use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::core::Invocable;
use crate::error::CallError;
use crate::value::Value;
use crate::world::WorldInner;

/// The identity of a world: a monotonically assigned integer, unique for
/// the lifetime of the process that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub u32);

/// The identity of a locally registered object, scoped to its owning
/// world's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

/// The marshalled form of a [`Handle`]: enough information for any world
/// that receives it to reconstruct a handle pointing at the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireRef {
    /// The world that owns the referenced object.
    pub world: WorldId,
    /// The object's id within that world's registry.
    pub object: ObjectId,
}

/// A proxy for an object that may live in this world or a remote one.
///
/// Member access is fully dynamic: any name not beginning with `_` yields
/// a callable that performs an RPC when invoked. When the handle's owning
/// world is the world it was obtained in, [`Handle::call`] takes a local
/// fast path and invokes the object directly rather than round-tripping
/// through the transport.
#[derive(Clone)]
pub struct Handle {
    pub(crate) owner: WorldId,
    pub(crate) object: ObjectId,
    pub(crate) local: Option<Rc<dyn Invocable>>,
    pub(crate) ctx: Weak<std::cell::RefCell<WorldInner>>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("owner", &self.owner)
            .field("object", &self.object)
            .field("local", &self.local.is_some())
            .finish()
    }
}

/// Two handles are equal iff they name the same `(worldId, objectId)`
/// pair. The registry's dedupe-on-register guarantees that any two
/// handles obtained for the same underlying object compare equal by this
/// definition, matching the "identity" testable property.
impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.object == other.object
    }
}

impl Eq for Handle {}

impl Handle {
    /// The wire form of this handle.
    pub fn wire_ref(&self) -> WireRef {
        WireRef { world: self.owner, object: self.object }
    }

    /// The id of the world that owns the referenced object.
    pub fn owner_world(&self) -> WorldId {
        self.owner
    }

    /// Invokes `member` with `args`.
    ///
    /// Rejects immediately, without touching the remote, if `member`
    /// begins with `_` (the private-member naming convention) or if the
    /// calling world context has been dropped.
    pub fn call(&self, member: &str, args: Vec<Value>) -> LocalBoxFuture<'static, Result<Value, CallError>> {
        if member.starts_with('_') {
            let err = CallError::PrivateMember(member.to_owned());
            return async move { Err(err) }.boxed_local();
        }

        let Some(ctx) = self.ctx.upgrade() else {
            return async move { Err(CallError::Disposed) }.boxed_local();
        };

        // The depth guard applies uniformly whether or not this call ever
        // touches the wire: it is the marshaller's policy on the argument
        // graph itself, not a property of the transport.
        if let Err(e) = crate::marshal::check_args_depth(&args) {
            return async move { Err(e) }.boxed_local();
        }

        if let Some(local) = &self.local {
            let local = local.clone();
            let member = member.to_owned();
            let disposed = crate::world::registry_entry_disposed(&ctx, self.owner, self.object);
            return async move {
                if disposed {
                    return Err(CallError::Disposed);
                }
                local.invoke(&member, args).await
            }
            .boxed_local();
        }

        crate::world::dispatch_remote_call(ctx, self.owner, self.object, member.to_owned(), args)
    }
}
