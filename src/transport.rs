//! The transport contract.
//!
//! The core never opens a socket, a pipe, or a `postMessage` channel itself:
//! it consumes any full-duplex, ordered, message-oriented link through a
//! single factory trait, taking an already-connected channel rather than
//! dialing one itself.

use std::rc::Rc;

use crate::message::Message;

/// A sink that delivers messages to one end of a transport link.
pub type Sender = Rc<dyn Fn(Message)>;

/// Constructs one side of a transport link.
///
/// Given a `receive` sink that the caller installs to be notified of
/// inbound messages, `create` returns the `send` sink used to deliver
/// messages to the peer. This is the `transportFactory(receiveFn) ->
/// sendFn` contract described for `create_world`/`init_world`.
pub trait TransportFactory {
    /// Wires up the link and returns the sender half.
    fn create(&self, receive: Sender) -> Sender;
}

impl<F> TransportFactory for F
where
    F: Fn(Sender) -> Sender,
{
    fn create(&self, receive: Sender) -> Sender {
        (self)(receive)
    }
}

/// Builds a pair of in-process transport factories that relay messages
/// synchronously into each other's `receive` sink.
///
/// This is a legitimate instantiation of the transport contract (ordered,
/// full-duplex, message-oriented) and is used by this crate's own tests to
/// exercise multi-world scenarios deterministically without sockets or
/// threads, running both ends of a connection cooperatively on one event
/// loop.
#[cfg(test)]
pub fn local_pair() -> (impl TransportFactory, impl TransportFactory) {
    use std::cell::RefCell;

    struct LocalFactory {
        peer_receive: Rc<RefCell<Option<Sender>>>,
        own_receive: Rc<RefCell<Option<Sender>>>,
    }

    impl TransportFactory for LocalFactory {
        fn create(&self, receive: Sender) -> Sender {
            *self.own_receive.borrow_mut() = Some(receive);
            let peer_receive = self.peer_receive.clone();
            Rc::new(move |msg: Message| {
                if let Some(f) = peer_receive.borrow().as_ref() {
                    f(msg);
                }
            })
        }
    }

    let a_receive: Rc<RefCell<Option<Sender>>> = Rc::new(RefCell::new(None));
    let b_receive: Rc<RefCell<Option<Sender>>> = Rc::new(RefCell::new(None));

    let a = LocalFactory { peer_receive: b_receive.clone(), own_receive: a_receive.clone() };
    let b = LocalFactory { peer_receive: a_receive, own_receive: b_receive };
    (a, b)
}
