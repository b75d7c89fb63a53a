//! Octree error types

use crate::foundation::math::Vec3;
use crate::spatial::Bounds;

/// Errors returned by octree mutations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OctreeError {
    /// The entry could not be placed even after growing the root
    ///
    /// Also returned for non-finite bounds, which no amount of growth can
    /// contain; in that case `attempts` is zero and the tree is untouched.
    #[error("Failed to place entry with bounds {bounds:?} after {attempts} attempts at growing the octree")]
    GrowthExhausted {
        /// Bounds of the rejected entry
        bounds: Bounds,
        /// Growth attempts made before giving up
        attempts: u32,
    },

    /// The handle no longer refers to an entry
    #[error("Stale entry handle: the entry was already removed")]
    StaleHandle,
}

/// A broken structural invariant found by [`Octree::validate`](crate::spatial::Octree::validate)
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    /// Incremental branch count differs from a full recount
    #[error("Node at {center:?} records branch count {recorded} but its subtree holds {actual} entries")]
    BranchCount {
        /// Center of the offending node
        center: Vec3,
        /// Stored count
        recorded: usize,
        /// Recounted value
        actual: usize,
    },

    /// Occupancy mask differs from the children's actual contents
    #[error("Node at {center:?} records occupancy {recorded:#010b} but its children hold {actual:#010b}")]
    Occupancy {
        /// Center of the offending node
        center: Vec3,
        /// Stored mask bits
        recorded: u8,
        /// Recomputed mask bits
        actual: u8,
    },

    /// An entry pokes out of its owner or one of the owner's ancestors
    #[error("Entry bounds {bounds:?} are not strictly inside node at {center:?}")]
    Containment {
        /// Center of the node that fails to contain the entry
        center: Vec3,
        /// Bounds of the entry
        bounds: Bounds,
    },

    /// An entry's owner or slot does not match where it was found
    #[error("Entry held by node at {center:?} has a mismatched owner back-reference")]
    OwnerMismatch {
        /// Center of the node holding the entry
        center: Vec3,
    },

    /// A child's parent link or octant does not match its position
    #[error("Child of node at {center:?} does not point back to its parent")]
    ParentMismatch {
        /// Center of the parent node
        center: Vec3,
    },

    /// Entries reachable from the root differ from attached entries
    #[error("Tree reaches {reachable} entries but {attached} are attached")]
    EntryCount {
        /// Entries found by walking the tree
        reachable: usize,
        /// Entries whose owner is set
        attached: usize,
    },
}
