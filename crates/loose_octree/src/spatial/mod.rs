//! Spatial partitioning data structures
//!
//! A dynamic loose octree for broad-phase collision detection, ray casting
//! and proximity queries in 3D space.

mod bounds;
mod diagnostics;
mod entry;
mod error;
mod node;
mod octant;
mod octree;
mod pool;
mod query;
mod ray;


slotmap::new_key_type! {
    /// Key of a node inside an octree's node pool
    pub struct NodeKey;
}

pub use bounds::Bounds;
pub use diagnostics::{DebugBox, DebugBoxKind, DebugDraw, DrawList, OctreeStats};
pub use entry::{Entry, EntryHandle};
pub use error::{InvariantViolation, OctreeError};
pub use node::Node;
pub use octant::{ChildMask, Octant};
pub use octree::Octree;
pub use pool::{ObjectPool, PoolStats, Recycle};
pub use ray::Ray;
