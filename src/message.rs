//! The wire protocol: the small set of messages exchanged between worlds.

use crate::handle::{ObjectId, WorldId};
use crate::value::Value;

/// The error shape carried inside a [`Message::Response`].
///
/// Kept separate from [`crate::error::CallError`] because only a message and
/// an optional stack are actually transmissible; the receiving dispatcher
/// reconstitutes a full `CallError::RemoteThrew` from it.
#[derive(Debug, Clone)]
pub struct WireError {
    /// The thrown error's message.
    pub message: String,
    /// The thrown error's stack trace, when available.
    pub stack: Option<String>,
}

impl WireError {
    /// Builds a wire error from any displayable error value.
    pub fn from_display(err: impl std::fmt::Display) -> WireError {
        WireError { message: err.to_string(), stack: None }
    }
}

/// A message exchanged between two worlds over a transport link.
#[derive(Debug, Clone)]
pub enum Message {
    /// Invoke `member` on the object `object` owned by world `world`.
    Call {
        /// Sequence number used to correlate the eventual response.
        seq: u64,
        /// The owning world of the target object.
        world: WorldId,
        /// The target object's id within its owning world's registry.
        object: ObjectId,
        /// The member name being invoked.
        member: String,
        /// Marshalled call arguments.
        args: Vec<Value>,
    },
    /// The response to a previously sent `Call`.
    Response {
        /// The sequence number of the call this responds to.
        seq: u64,
        /// Either the marshalled result, or the marshalled error.
        result: Result<Value, WireError>,
    },
    /// Sent from a parent to a newly spawned child to assign it an id and
    /// deliver its constructor arguments.
    CreateWorld {
        /// The world id assigned to the child.
        new_world: WorldId,
        /// The id of the world sending this message, so the child can
        /// register a transport link back to it.
        parent: WorldId,
        /// Arguments retrievable by the child via `worldArgs()`.
        args: Vec<Value>,
    },
    /// Sent from a child back to its parent once initialization completes.
    WorldReady {
        /// The world id of the child that is now ready.
        new_world: WorldId,
    },
    /// Notifies a peer that the sender considers it disposed: the sender's
    /// own id, so the recipient knows which of its peers just went away.
    DisposeWorld {
        /// The id of the world sending this notice.
        world: WorldId,
    },
}
