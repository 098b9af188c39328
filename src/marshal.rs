//! Argument graph validation: the depth cap that stands in for cycle
//! detection, and the routing-table side effect of observing a foreign
//! handle arrive on a particular link.
//!
//! A JS value graph can contain a genuine reference cycle (`a.a = a`); an
//! owned Rust [`Value`] tree cannot, since there is no back-reference a
//! node could hold to an ancestor. The depth cap is kept anyway, both
//! because it still bounds legitimately-deep nesting and because the
//! cyclic-argument end-to-end scenario is realized here as a deliberately
//! deep (21-level) acyclic graph tripping the same `RefChainTooLong` path
//! a cyclic one would have: the observable error is identical, only the
//! means of construction differs.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use crate::error::CallError;
use crate::handle::WorldId;
use crate::value::Value;
use crate::world::WorldInner;

/// Composite nodes deeper than this fail with [`CallError::RefChainTooLong`].
pub const MAX_DEPTH: usize = 20;

/// Walks `value`, failing if any composite nesting exceeds [`MAX_DEPTH`].
pub fn check_depth(value: &Value) -> Result<(), CallError> {
    check_depth_at(value, 0)
}

fn check_depth_at(value: &Value, depth: usize) -> Result<(), CallError> {
    if depth > MAX_DEPTH {
        return Err(CallError::RefChainTooLong);
    }
    match value {
        Value::List(items) => {
            for item in items {
                check_depth_at(item, depth + 1)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            for (_, v) in entries {
                check_depth_at(v, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Checks a full call's argument list, where the list itself is the
/// top-level (depth 0) node per argument.
pub fn check_args_depth(args: &[Value]) -> Result<(), CallError> {
    for arg in args {
        check_depth(arg)?;
    }
    Ok(())
}

/// Records, for every foreign handle found in `value`, which peer link it
/// arrived on -- first sighting wins. This is what lets a world that
/// merely bridges two others route a later call toward a handle's owner
/// without that owner being a direct peer.
pub fn record_routes(world: &Rc<RefCell<WorldInner>>, from_peer: WorldId, value: &Value) {
    let this_id = world.borrow().id();
    walk_for_routes(world, this_id, from_peer, value);
}

fn walk_for_routes(world: &Rc<RefCell<WorldInner>>, this_id: WorldId, from_peer: WorldId, value: &Value) {
    match value {
        Value::Handle(wire_ref) => {
            if wire_ref.world != this_id && wire_ref.world != from_peer {
                let mut inner = world.borrow_mut();
                if let Entry::Vacant(slot) = inner.routes.entry(wire_ref.world) {
                    slot.insert(from_peer);
                }
            }
        }
        Value::List(items) => {
            for item in items {
                walk_for_routes(world, this_id, from_peer, item);
            }
        }
        Value::Map(entries) => {
            for (_, v) in entries {
                walk_for_routes(world, this_id, from_peer, v);
            }
        }
        _ => {}
    }
}
