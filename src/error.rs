//! Error types for the RPC fabric.
//!
//! Like the rest of this crate, errors are hand-rolled `std::error::Error`
//! implementations rather than derived: the contractual part of each error
//! is its [`Display`](std::fmt::Display) message, which tests match on by
//! substring, so the exact wording is written out here rather than left to
//! a derive macro's formatting conventions.

use std::fmt;

/// An error produced by a remote call or by the local proxy layer rejecting
/// a call before it ever reaches the wire.
#[derive(Debug, Clone)]
pub enum CallError {
    /// The target object has no member of that name.
    NoMember(String),
    /// The member name begins with `_` and is not exposed over RPC.
    PrivateMember(String),
    /// The member resolved to a non-callable value and was invoked with arguments.
    NotCallable(String),
    /// An argument graph exceeded the marshaller's depth cap.
    RefChainTooLong,
    /// The handle, or the world it belongs to, has been disposed.
    Disposed,
    /// The peer world was disposed while a call targeting it was in flight.
    PeerDisposed,
    /// An argument was structurally invalid (e.g. a handle wrapping a handle).
    InvalidInput(String),
    /// The remote method itself threw; `message` and `stack` are forwarded verbatim.
    RemoteThrew {
        /// The thrown error's message.
        message: String,
        /// The thrown error's stack trace, if the remote provided one.
        stack: Option<String>,
    },
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::NoMember(name) => write!(f, "There is no member '{name}'"),
            CallError::PrivateMember(name) => {
                write!(f, "Private members are not exposed over RPC: '{name}'")
            }
            CallError::NotCallable(name) => write!(f, "'{name}' is not a function"),
            CallError::RefChainTooLong => f.write_str("Object reference chain is too long"),
            CallError::Disposed => f.write_str("Object has been diposed"),
            CallError::PeerDisposed => f.write_str("Peer world has been disposed"),
            CallError::InvalidInput(reason) => write!(f, "Invalid input: {reason}"),
            CallError::RemoteThrew { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<RpcError> for CallError {
    fn from(err: RpcError) -> CallError {
        match err {
            RpcError::InvalidInput(reason) => CallError::InvalidInput(reason),
            RpcError::NotFound => CallError::InvalidInput("unknown object id".into()),
            RpcError::Disposed => CallError::Disposed,
        }
    }
}

/// A narrower error for registry-only operations that never cross the wire
/// and therefore never carry a stack trace.
#[derive(Debug, Clone)]
pub enum RpcError {
    /// The operation received a structurally invalid argument.
    InvalidInput(String),
    /// No entry exists for the given id.
    NotFound,
    /// The entry has been disposed.
    Disposed,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::InvalidInput(reason) => write!(f, "Invalid input: {reason}"),
            RpcError::NotFound => f.write_str("No such object"),
            RpcError::Disposed => f.write_str("Object has been diposed"),
        }
    }
}

impl std::error::Error for RpcError {}
