//! The call dispatcher: sequence-number bookkeeping for in-flight calls.
//!
//! Kept as a plain data structure embedded in [`crate::world::WorldInner`]
//! rather than a free-standing actor, since the whole fabric is single
//! threaded and there is no concurrency to arbitrate between dispatcher
//! and world state.

use std::collections::HashMap;

use futures::channel::oneshot;

use crate::error::CallError;
use crate::handle::WorldId;
use crate::value::Value;

type PendingTx = oneshot::Sender<Result<Value, CallError>>;

struct Pending {
    tx: PendingTx,
    peer: WorldId,
}

/// Per-world dispatcher state: outstanding calls this world has issued,
/// and the bookkeeping needed to relay calls this world merely forwards
/// between two other worlds it bridges.
#[derive(Default)]
pub struct Dispatcher {
    next_seq: u64,
    pending: HashMap<u64, Pending>,
    peer_pending: HashMap<WorldId, Vec<u64>>,
    /// `(outgoing peer, new seq) -> (incoming peer, original seq)`
    forward: HashMap<(WorldId, u64), (WorldId, u64)>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Dispatcher {
        Dispatcher::default()
    }

    /// Allocates a fresh sequence number.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Records a pending call targeting `peer`, returning the receiver
    /// half of the promise resolved when a matching response arrives.
    pub fn register_pending(&mut self, seq: u64, peer: WorldId) -> oneshot::Receiver<Result<Value, CallError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, Pending { tx, peer });
        self.peer_pending.entry(peer).or_default().push(seq);
        rx
    }

    /// Resolves a pending call. Silently does nothing if no call is
    /// waiting under `seq` (a late response after disposal).
    pub fn resolve(&mut self, seq: u64, result: Result<Value, CallError>) {
        if let Some(pending) = self.pending.remove(&seq) {
            if let Some(seqs) = self.peer_pending.get_mut(&pending.peer) {
                seqs.retain(|s| *s != seq);
            }
            let _ = pending.tx.send(result);
        }
    }

    /// Rejects every call pending against `peer` with
    /// [`CallError::PeerDisposed`], clearing them from the table.
    pub fn cancel_for_peer(&mut self, peer: WorldId) {
        if let Some(seqs) = self.peer_pending.remove(&peer) {
            for seq in seqs {
                if let Some(pending) = self.pending.remove(&seq) {
                    let _ = pending.tx.send(Err(CallError::PeerDisposed));
                }
            }
        }
    }

    /// Records that a call relayed onward under `new_seq` to `outgoing`
    /// originated from `incoming` under `orig_seq`, so that its eventual
    /// response can be routed back.
    pub fn record_forward(&mut self, outgoing: WorldId, new_seq: u64, incoming: WorldId, orig_seq: u64) {
        self.forward.insert((outgoing, new_seq), (incoming, orig_seq));
    }

    /// Looks up and removes a forwarding entry for a response arriving
    /// from `outgoing` under `seq`.
    pub fn take_forward(&mut self, outgoing: WorldId, seq: u64) -> Option<(WorldId, u64)> {
        self.forward.remove(&(outgoing, seq))
    }
}
