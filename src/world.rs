//! The world manager: world ids, peer routing, and the lifecycle
//! (creation, disposal, in-flight call cancellation) that ties the
//! registry, dispatcher and marshaller together.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use futures::FutureExt;

use crate::core::Invocable;
use crate::dispatcher::Dispatcher;
use crate::error::{CallError, RpcError};
use crate::handle::{Handle, ObjectId, WorldId};
use crate::marshal;
use crate::message::{Message, WireError};
use crate::registry::Registry;
use crate::transport::{Sender, TransportFactory};
use crate::value::Value;

thread_local! {
    static NEXT_WORLD_ID: Cell<u32> = const { Cell::new(0) };
}

fn alloc_world_id() -> WorldId {
    NEXT_WORLD_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        WorldId(id)
    })
}

struct PeerLink {
    send: Sender,
}

/// The object every world implicitly registers at id 0, exposing
/// `worldArgs()` to whoever holds the handle this world's creator
/// receives back from `create_world`.
struct RootObject {
    args: Vec<Value>,
}

impl Invocable for RootObject {
    fn invoke(&self, member: &str, args: Vec<Value>) -> LocalBoxFuture<'_, Result<Value, CallError>> {
        let result = match member {
            "worldArgs" if args.is_empty() => Ok(Value::list(self.args.clone())),
            "worldArgs" => Err(CallError::NotCallable("worldArgs".into())),
            other => Err(CallError::NoMember(other.to_owned())),
        };
        async move { result }.boxed_local()
    }
}

pub(crate) struct WorldInner {
    id: WorldId,
    registry: Registry,
    dispatcher: Dispatcher,
    peers: HashMap<WorldId, PeerLink>,
    pub(crate) routes: HashMap<WorldId, WorldId>,
    disposed_peers: HashSet<WorldId>,
    pending_ready: HashMap<WorldId, oneshot::Sender<()>>,
    pending_parent_send: Option<Sender>,
    /// Set once, by `receive_as_child`, to the world id of the parent that
    /// created this world. A child only ever receives non-`CreateWorld`
    /// messages over its one transport link to that parent, so this is the
    /// `from` every such message is attributed to for routing purposes.
    parent_id: Option<WorldId>,
}

impl WorldInner {
    fn new(id: WorldId) -> WorldInner {
        WorldInner {
            id,
            registry: Registry::new(),
            dispatcher: Dispatcher::new(),
            peers: HashMap::new(),
            routes: HashMap::new(),
            disposed_peers: HashSet::new(),
            pending_ready: HashMap::new(),
            pending_parent_send: None,
            parent_id: None,
        }
    }

    pub(crate) fn id(&self) -> WorldId {
        self.id
    }

    fn route_to(&self, target: WorldId) -> Option<WorldId> {
        if self.peers.contains_key(&target) {
            Some(target)
        } else {
            self.routes.get(&target).copied()
        }
    }

    fn send_to(&self, peer: WorldId, msg: Message) {
        if self.disposed_peers.contains(&peer) {
            return;
        }
        if let Some(link) = self.peers.get(&peer) {
            (link.send)(msg);
        }
    }
}

/// An isolated execution context with its own object registry,
/// transports and pending-call table.
///
/// `World` is a cheaply cloneable handle around shared, `!Send`/`!Sync`
/// interior-mutable state -- cooperating single-threaded executors each
/// own one `World`; sharing one across threads is a compile error, not a
/// runtime race condition to guard against.
///
/// The task pool that services locally-invoked async methods (see
/// [`World::pump`]) is kept in its own `RefCell`, separate from
/// [`WorldInner`]: draining it polls user futures that themselves need to
/// borrow `WorldInner` again (to dispatch further calls, resolve pending
/// ones, and so on). Holding one borrow across the other would make any
/// callee that issues a further RPC panic with a re-entrant borrow.
#[derive(Clone)]
pub struct World {
    inner: Rc<RefCell<WorldInner>>,
    pool: Rc<RefCell<LocalPool>>,
    spawner: LocalSpawner,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World").field("id", &self.inner.borrow().id).finish()
    }
}

impl World {
    fn from_inner(inner: Rc<RefCell<WorldInner>>) -> World {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        World { inner, pool: Rc::new(RefCell::new(pool)), spawner }
    }

    /// Creates a root world with a freshly allocated id and no peers.
    pub fn new_root() -> World {
        let id = alloc_world_id();
        World::from_inner(Rc::new(RefCell::new(WorldInner::new(id))))
    }

    /// This world's id.
    pub fn id(&self) -> WorldId {
        self.inner.borrow().id()
    }

    /// Wraps `object` in a handle owned by this world, de-duplicating
    /// against any existing registration of the same object.
    pub fn handle(&self, object: Rc<dyn Invocable>) -> Handle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.registry.register(object.clone());
        log::trace!("world {:?} registered object {:?}", inner.id, id);
        Handle { owner: inner.id, object: id, local: Some(object), ctx: Rc::downgrade(&self.inner) }
    }

    /// Recovers the underlying object behind a handle owned by this world.
    pub fn object(&self, handle: &Handle) -> Result<Rc<dyn Invocable>, RpcError> {
        let inner = self.inner.borrow();
        if handle.owner != inner.id {
            return Err(RpcError::InvalidInput("handle belongs to a different world".into()));
        }
        inner.registry.lookup(handle.object)
    }

    /// Reconstructs a callable [`Handle`] from a wire reference found
    /// inside demarshalled call arguments or a call result. If this world
    /// owns the referenced object, the returned handle carries the direct
    /// strong reference used for fast-path materialization; otherwise
    /// invocation routes through whichever peer the reference arrived on.
    pub fn handle_from_wire(&self, wire: crate::handle::WireRef) -> Handle {
        let inner = self.inner.borrow();
        let local = if wire.world == inner.id { inner.registry.lookup(wire.object).ok() } else { None };
        Handle { owner: wire.world, object: wire.object, local, ctx: Rc::downgrade(&self.inner) }
    }

    /// Disposes the object behind `handle`. Must be called on the world
    /// that owns it; subsequent calls on the handle fail with `Disposed`.
    pub fn dispose(&self, handle: &Handle) -> Result<(), RpcError> {
        let mut inner = self.inner.borrow_mut();
        if handle.owner != inner.id {
            return Err(RpcError::InvalidInput("handle belongs to a different world".into()));
        }
        inner.registry.dispose(handle.object)
    }

    /// Spawns a child world over a freshly created transport link,
    /// resolving once the child acknowledges readiness.
    pub fn create_world(
        &self,
        factory: impl TransportFactory,
        args: Vec<Value>,
    ) -> impl std::future::Future<Output = Result<Handle, CallError>> {
        let child_id = alloc_world_id();
        let parent_id = self.id();
        let inner_rc = self.inner.clone();
        let spawner = self.spawner.clone();

        let recv_inner = inner_rc.clone();
        let recv_spawner = spawner.clone();
        let receive: Sender = Rc::new(move |msg: Message| {
            World::receive_on(&recv_inner, &recv_spawner, child_id, msg);
        });
        let send = factory.create(receive);

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut inner = inner_rc.borrow_mut();
            inner.peers.insert(child_id, PeerLink { send: send.clone() });
            inner.pending_ready.insert(child_id, ready_tx);
        }
        log::debug!("world {parent_id:?} spawning child world {child_id:?}");

        // The actual handshake message is sent lazily, on first poll, not
        // eagerly here: the callee may not have wired up its own end of
        // `factory` yet (it typically calls `init_world` right after this
        // returns, before awaiting it), and a future that does nothing
        // until polled is the idiomatic way to give it that chance.
        async move {
            send(Message::CreateWorld { new_world: child_id, parent: parent_id, args });
            let _ = ready_rx.await;
            Ok(Handle { owner: child_id, object: ObjectId(0), local: None, ctx: Rc::downgrade(&inner_rc) })
        }
    }

    /// The child side of spawning: registers the transport link and, once
    /// the first `CreateWorld` arrives, assumes the assigned id, exposes
    /// `worldArgs()`, and hands the caller a handle to the parent plus
    /// this world itself.
    pub fn init_world(factory: impl TransportFactory, initializer: impl FnOnce(Handle, World) + 'static) -> World {
        let placeholder = alloc_world_id();
        let world = World::from_inner(Rc::new(RefCell::new(WorldInner::new(placeholder))));
        let inner_rc = world.inner.clone();
        let spawner = world.spawner.clone();
        let init_cell: Rc<RefCell<Option<Box<dyn FnOnce(Handle, World)>>>> =
            Rc::new(RefCell::new(Some(Box::new(initializer))));

        let recv_inner = inner_rc.clone();
        let recv_init = init_cell.clone();
        let recv_world = world.clone();
        let receive: Sender = Rc::new(move |msg: Message| {
            World::receive_as_child(&recv_inner, &spawner, &recv_init, &recv_world, msg);
        });
        let send = factory.create(receive);
        inner_rc.borrow_mut().pending_parent_send = Some(send);

        world
    }

    /// Drains any locally-serviced async methods that have not yet
    /// reached a suspension point. Hosts driving methods that suspend
    /// beyond a single stall should call this again after the event that
    /// unblocks them.
    pub fn pump(&self) -> usize {
        let mut pool = self.pool.borrow_mut();
        pool.run_until_stalled()
    }

    /// Disposes a peer world: rejects every call this world has in
    /// flight toward it, drops its transport link, and notifies it so it
    /// can do the same for calls it had in flight toward us.
    pub fn dispose_world(&self, id: WorldId) {
        let mut inner = self.inner.borrow_mut();
        log::debug!("world {:?} disposing peer world {:?}", inner.id, id);
        inner.disposed_peers.insert(id);
        inner.dispatcher.cancel_for_peer(id);
        if let Some(link) = inner.peers.remove(&id) {
            // Tell the peer our own id, not theirs: `DisposeWorld.world` is
            // always read by its recipient as "this peer of mine is gone",
            // so it must name the world the recipient knows us as.
            (link.send)(Message::DisposeWorld { world: inner.id });
        }
    }

    /// Delivers a message received from peer `from` to an already
    /// established world.
    pub fn receive(&self, from: WorldId, msg: Message) {
        World::receive_on(&self.inner, &self.spawner, from, msg);
    }

    fn receive_as_child(
        inner_rc: &Rc<RefCell<WorldInner>>,
        spawner: &LocalSpawner,
        init_cell: &Rc<RefCell<Option<Box<dyn FnOnce(Handle, World)>>>>,
        self_world: &World,
        msg: Message,
    ) {
        match msg {
            Message::CreateWorld { new_world, parent, args } => {
                log::debug!("world {new_world:?} received its identity from parent {parent:?}");
                let send = inner_rc.borrow_mut().pending_parent_send.take();
                {
                    let mut inner = inner_rc.borrow_mut();
                    inner.id = new_world;
                    inner.parent_id = Some(parent);
                    if let Some(send) = send {
                        inner.peers.insert(parent, PeerLink { send });
                    }
                    inner.registry.register(Rc::new(RootObject { args: args.clone() }));
                }
                marshal::record_routes(inner_rc, parent, &Value::list(args.clone()));
                let parent_handle =
                    Handle { owner: parent, object: ObjectId(0), local: None, ctx: Rc::downgrade(inner_rc) };
                if let Some(init) = init_cell.borrow_mut().take() {
                    init(parent_handle, self_world.clone());
                }
                let inner = inner_rc.borrow();
                inner.send_to(parent, Message::WorldReady { new_world });
            }
            other => {
                let from = inner_rc.borrow().parent_id.unwrap_or(WorldId(u32::MAX));
                World::receive_on(inner_rc, spawner, from, other)
            }
        }
    }

    fn receive_on(inner_rc: &Rc<RefCell<WorldInner>>, spawner: &LocalSpawner, from: WorldId, msg: Message) {
        match msg {
            Message::Call { seq, world, object, member, args } => {
                log::trace!("recv call seq={seq} from={from:?} world={world:?} object={object:?} member={member}");
                let args_value = Value::list(args.clone());
                marshal::record_routes(inner_rc, from, &args_value);

                let this_id = inner_rc.borrow().id();
                if world == this_id {
                    let looked_up = inner_rc.borrow_mut().registry.lookup(object);
                    match looked_up {
                        Err(err) => {
                            log::debug!("call seq={seq} targets unresolvable object {object:?}: {err}");
                            let wire = WireError::from_display(CallError::from(err));
                            World::send_response(inner_rc, from, seq, Err(wire));
                        }
                        Ok(obj) => {
                            let inner_for_task = inner_rc.clone();
                            let fut = async move {
                                let result = obj.invoke(&member, args).await;
                                let wire = result.map_err(WireError::from_display);
                                World::send_response(&inner_for_task, from, seq, wire);
                            };
                            let _ = spawner.spawn_local(fut);
                        }
                    }
                } else {
                    let next = inner_rc.borrow().route_to(world);
                    match next {
                        Some(next_peer) => {
                            let new_seq = inner_rc.borrow_mut().dispatcher.next_seq();
                            inner_rc.borrow_mut().dispatcher.record_forward(next_peer, new_seq, from, seq);
                            let fwd = Message::Call { seq: new_seq, world, object, member, args };
                            inner_rc.borrow().send_to(next_peer, fwd);
                        }
                        None => {
                            let wire = WireError { message: "no route to world".into(), stack: None };
                            World::send_response(inner_rc, from, seq, Err(wire));
                        }
                    }
                }
            }
            Message::Response { seq, result } => {
                if let Ok(v) = &result {
                    marshal::record_routes(inner_rc, from, v);
                }

                let forwarded = inner_rc.borrow_mut().dispatcher.take_forward(from, seq);
                match forwarded {
                    Some((incoming_peer, orig_seq)) => {
                        let msg = Message::Response { seq: orig_seq, result };
                        inner_rc.borrow().send_to(incoming_peer, msg);
                    }
                    None => {
                        let call_error = result.map_err(|w| CallError::RemoteThrew { message: w.message, stack: w.stack });
                        inner_rc.borrow_mut().dispatcher.resolve(seq, call_error);
                    }
                }
            }
            Message::WorldReady { new_world } => {
                let tx = inner_rc.borrow_mut().pending_ready.remove(&new_world);
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
            }
            Message::DisposeWorld { world } => {
                inner_rc.borrow_mut().disposed_peers.insert(world);
                inner_rc.borrow_mut().dispatcher.cancel_for_peer(world);
            }
            Message::CreateWorld { .. } => {
                // Only meaningful to a world still awaiting its own identity;
                // an already-established world ignores stray re-sends.
            }
        }
    }

    fn send_response(inner_rc: &Rc<RefCell<WorldInner>>, to: WorldId, seq: u64, result: Result<Value, WireError>) {
        let inner = inner_rc.borrow();
        inner.send_to(to, Message::Response { seq, result });
    }
}

/// Checks, under the calling world's own registry, whether the object a
/// local-fast-path handle points at has been disposed.
pub(crate) fn registry_entry_disposed(ctx: &Rc<RefCell<WorldInner>>, owner: WorldId, object: ObjectId) -> bool {
    let inner = ctx.borrow();
    if inner.id != owner {
        return true;
    }
    inner.registry.lookup(object).is_err()
}

/// Routes a call toward a (possibly remote) object, taking the
/// disposed-peer silent-drop path or the normal send-and-await path. The
/// depth guard itself is applied uniformly by [`Handle::call`] before
/// this is ever reached, whether or not the call ends up local or remote.
pub(crate) fn dispatch_remote_call(
    ctx: Rc<RefCell<WorldInner>>,
    owner: WorldId,
    object: ObjectId,
    member: String,
    args: Vec<Value>,
) -> LocalBoxFuture<'static, Result<Value, CallError>> {
    {
        let inner = ctx.borrow();
        if inner.disposed_peers.contains(&owner) {
            log::debug!("dropping call to {member} on disposed world {owner:?}");
            return futures::future::pending().boxed_local();
        }
    }
    let target_peer = {
        let inner = ctx.borrow();
        inner.route_to(owner)
    };
    let Some(target_peer) = target_peer else {
        return async move { Err(CallError::InvalidInput("unknown world".into())) }.boxed_local();
    };
    let (seq, rx) = {
        let mut inner = ctx.borrow_mut();
        let seq = inner.dispatcher.next_seq();
        let rx = inner.dispatcher.register_pending(seq, owner);
        (seq, rx)
    };
    log::trace!("send call seq={seq} owner={owner:?} object={object:?} member={member} via={target_peer:?}");
    {
        let inner = ctx.borrow();
        inner.send_to(target_peer, Message::Call { seq, world: owner, object, member, args });
    }
    async move {
        match rx.await {
            Ok(result) => result,
            Err(_canceled) => Err(CallError::PeerDisposed),
        }
    }
    .boxed_local()
}
