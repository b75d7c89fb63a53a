//! Entries stored in the octree

use crate::spatial::{Bounds, NodeKey};

slotmap::new_key_type! {
    /// Handle to an entry inserted into an [`Octree`](crate::spatial::Octree)
    ///
    /// Handles are generational: once the entry is removed the handle goes
    /// stale and every lookup through it fails, even after the slot is reused
    /// by a later insert.
    pub struct EntryHandle;
}

/// A payload together with its bounds and its place in the tree
#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub(crate) payload: T,
    pub(crate) bounds: Bounds,
    pub(crate) is_point: bool,
    /// Node holding this entry; a back-reference, never ownership
    pub(crate) owner: Option<NodeKey>,
    /// Position in the owner's entry list
    pub(crate) slot: usize,
}

impl<T> Entry<T> {
    pub(crate) fn new(payload: T, bounds: Bounds, is_point: bool) -> Self {
        Self {
            payload,
            bounds,
            is_point,
            owner: None,
            slot: 0,
        }
    }

    /// The stored value
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Bounds the entry was inserted with
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Whether the entry was inserted as a point
    pub fn is_point(&self) -> bool {
        self.is_point
    }

    /// Whether the entry currently sits in a node
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    pub(crate) fn attach(&mut self, owner: NodeKey, slot: usize) {
        self.owner = Some(owner);
        self.slot = slot;
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.slot = 0;
    }

    pub(crate) fn into_payload(self) -> T {
        self.payload
    }
}
