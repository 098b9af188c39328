//! The per-world object registry.
//!
//! A flat, append-only `Vec` of slots rather than a hash map, since
//! registries are expected to stay small (tens to low hundreds of live
//! objects). Object ids are never reused, so there is no need for a
//! serial-tagged staleness check to guard against freed-id reuse races.

use std::rc::Rc;

use crate::core::Invocable;
use crate::error::RpcError;
use crate::handle::ObjectId;

struct Entry {
    object: Rc<dyn Invocable>,
    disposed: bool,
}

/// A world's table of locally-owned objects.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry { entries: Vec::new() }
    }

    /// Registers `object`, returning its existing id if it was already
    /// registered (reference identity, via [`Rc::ptr_eq`]) so that a
    /// round-tripped handle always identifies the same object.
    pub fn register(&mut self, object: Rc<dyn Invocable>) -> ObjectId {
        for (idx, entry) in self.entries.iter().enumerate() {
            if !entry.disposed && Rc::ptr_eq(&entry.object, &object) {
                return ObjectId(idx as u32);
            }
        }
        let id = ObjectId(self.entries.len() as u32);
        self.entries.push(Entry { object, disposed: false });
        id
    }

    /// Looks up a live object by id.
    pub fn lookup(&self, id: ObjectId) -> Result<Rc<dyn Invocable>, RpcError> {
        match self.entries.get(id.0 as usize) {
            None => Err(RpcError::NotFound),
            Some(entry) if entry.disposed => Err(RpcError::Disposed),
            Some(entry) => Ok(entry.object.clone()),
        }
    }

    /// Marks an entry as disposed. The slot is retained so that late
    /// arriving calls observe a clean `Disposed` rejection rather than an
    /// id-reuse race.
    pub fn dispose(&mut self, id: ObjectId) -> Result<(), RpcError> {
        match self.entries.get_mut(id.0 as usize) {
            None => Err(RpcError::NotFound),
            Some(entry) if entry.disposed => Err(RpcError::Disposed),
            Some(entry) => {
                entry.disposed = true;
                Ok(())
            }
        }
    }
}
