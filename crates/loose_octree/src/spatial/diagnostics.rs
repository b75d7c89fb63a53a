//! Introspection for octrees
//!
//! Statistics, a text dump of the node hierarchy, a debug drawing visitor
//! and a full invariant check that recounts everything the tree tracks
//! incrementally.

use std::fmt::{self, Write as _};

use crate::foundation::math::Vec3;
use crate::spatial::{Bounds, ChildMask, InvariantViolation, NodeKey, Octant, Octree, PoolStats};

/// Summary of an octree's shape and pool usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeStats {
    /// Live entries, attached or not
    pub entries: usize,
    /// Nodes in the tree
    pub nodes: usize,
    /// Nodes without children
    pub leaves: usize,
    /// Depth of the deepest node (root = 0)
    pub max_depth: u32,
    /// Largest local entry count of any node
    pub max_entries_per_node: usize,
    /// Nodes holding more local entries than the capacity
    pub overfull_nodes: usize,
    /// Loose bounds of the root
    pub root_bounds: Bounds,
    /// Node pool counters
    pub node_pool: PoolStats,
    /// Entry pool counters
    pub entry_pool: PoolStats,
}

impl fmt::Display for OctreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.root_bounds.size();
        writeln!(f, "Octree: {} entries in {} nodes ({} leaves)", self.entries, self.nodes, self.leaves)?;
        writeln!(
            f,
            "  depth {}, at most {} entries per node, {} over capacity",
            self.max_depth, self.max_entries_per_node, self.overfull_nodes
        )?;
        writeln!(f, "  root length {:.2}", size.x)?;
        writeln!(
            f,
            "  node pool: {} live, {} spare, {} reused",
            self.node_pool.live, self.node_pool.spare, self.node_pool.reused
        )?;
        write!(f, "  entry pool: {} live, {} acquired", self.entry_pool.live, self.entry_pool.acquired)
    }
}

/// Receiver for debug geometry
///
/// [`Octree::draw`] calls `draw_node` for every node's loose bounds and
/// `draw_entry` for every entry stored in it, root first.
pub trait DebugDraw {
    /// Draw the loose bounds of a node
    fn draw_node(&mut self, bounds: &Bounds, depth: u32);

    /// Draw the bounds of an entry stored in a node at `depth`
    fn draw_entry(&mut self, _bounds: &Bounds, _is_point: bool, _depth: u32) {}
}

/// Kind of a recorded debug box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugBoxKind {
    /// Loose bounds of a node
    Node,
    /// Bounds of a volume entry
    Entry,
    /// Position of a point entry
    Point,
}

/// A box recorded by [`DrawList`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugBox {
    /// Center of the box
    pub center: Vec3,
    /// Half-size of the box
    pub extents: Vec3,
    /// Depth of the node the box belongs to
    pub depth: u32,
    /// What the box represents
    pub kind: DebugBoxKind,
}

/// Debug drawer that records boxes for a renderer to consume later
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    /// Recorded boxes in draw order
    pub boxes: Vec<DebugBox>,
}

impl DrawList {
    /// Create an empty draw list
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxes of the given kind
    pub fn of_kind(&self, kind: DebugBoxKind) -> impl Iterator<Item = &DebugBox> {
        self.boxes.iter().filter(move |b| b.kind == kind)
    }

    /// Drop every recorded box
    pub fn clear(&mut self) {
        self.boxes.clear();
    }
}

impl DebugDraw for DrawList {
    fn draw_node(&mut self, bounds: &Bounds, depth: u32) {
        self.boxes.push(DebugBox {
            center: bounds.center(),
            extents: bounds.extents(),
            depth,
            kind: DebugBoxKind::Node,
        });
    }

    fn draw_entry(&mut self, bounds: &Bounds, is_point: bool, depth: u32) {
        self.boxes.push(DebugBox {
            center: bounds.center(),
            extents: bounds.extents(),
            depth,
            kind: if is_point { DebugBoxKind::Point } else { DebugBoxKind::Entry },
        });
    }
}

impl<T> Octree<T> {
    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.arena.nodes.len()
    }

    /// Depth of the deepest node, 0 for a lone root
    pub fn depth(&self) -> u32 {
        let mut deepest = 0;
        self.arena.for_each_node(self.root, |_, _, depth| deepest = deepest.max(depth));
        deepest
    }

    /// Gather statistics about the tree
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            entries: self.len(),
            nodes: self.node_count(),
            leaves: 0,
            max_depth: 0,
            max_entries_per_node: 0,
            overfull_nodes: 0,
            root_bounds: self.max_bounds(),
            node_pool: self.arena.nodes.stats(),
            entry_pool: self.arena.entries.stats(),
        };

        let capacity = self.capacity();
        self.arena.for_each_node(self.root, |_, node, depth| {
            if node.is_leaf() {
                stats.leaves += 1;
            }
            stats.max_depth = stats.max_depth.max(depth);
            stats.max_entries_per_node = stats.max_entries_per_node.max(node.entries.len());
            if node.entries.len() > capacity {
                stats.overfull_nodes += 1;
            }
        });
        stats
    }

    /// One line per node, indented by depth
    ///
    /// Each line holds the depth, center, base length, local entry count,
    /// branch count and occupancy bits of a node.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.arena.for_each_node(self.root, |_, node, depth| {
            let c = node.center;
            let _ = writeln!(
                out,
                "{:indent$}[{}] center=({:.2}, {:.2}, {:.2}) length={:.2} local={} branch={} occupancy={:08b}",
                "",
                depth,
                c.x,
                c.y,
                c.z,
                node.base_length,
                node.entries.len(),
                node.branch_count,
                node.occupancy.bits(),
                indent = depth as usize * 2
            );
        });
        out
    }

    /// Feed every node and entry to a debug drawer
    pub fn draw(&self, drawer: &mut impl DebugDraw) {
        self.arena.for_each_node(self.root, |_, node, depth| {
            drawer.draw_node(&node.loose_bounds, depth);
            for &handle in &node.entries {
                let entry = &self.arena.entries[handle];
                drawer.draw_entry(&entry.bounds, entry.is_point, depth);
            }
        });
    }

    /// Recount everything the tree tracks incrementally
    ///
    /// Checks containment of every entry in its node and all ancestors,
    /// owner and slot back-references, parent links, branch counts and
    /// occupancy masks.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let root = &self.arena.nodes[self.root];
        if root.parent.is_some() {
            return Err(InvariantViolation::ParentMismatch { center: root.center });
        }

        let mut ancestors = Vec::new();
        let mut reachable = 0;
        self.check_subtree(self.root, &mut ancestors, &mut reachable)?;

        let attached = self.arena.entries.iter().filter(|(_, entry)| entry.is_attached()).count();
        if reachable != attached {
            return Err(InvariantViolation::EntryCount { reachable, attached });
        }
        Ok(())
    }

    /// Returns the total entry count of the subtree
    fn check_subtree(
        &self,
        key: NodeKey,
        ancestors: &mut Vec<NodeKey>,
        reachable: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        let node = &self.arena.nodes[key];

        for (slot, &handle) in node.entries.iter().enumerate() {
            let entry = self
                .arena
                .entries
                .get(handle)
                .filter(|entry| entry.owner == Some(key) && entry.slot == slot)
                .ok_or(InvariantViolation::OwnerMismatch { center: node.center })?;

            for &holder in ancestors.iter().chain(std::iter::once(&key)) {
                let holder = &self.arena.nodes[holder];
                if !holder.loose_bounds.contains(&entry.bounds) {
                    return Err(InvariantViolation::Containment {
                        center: holder.center,
                        bounds: entry.bounds,
                    });
                }
            }
        }
        *reachable += node.entries.len();

        let mut branch_count = 0;
        let mut occupancy = ChildMask::empty();
        if let Some(children) = &node.children {
            ancestors.push(key);
            for octant in Octant::all() {
                let child = children[octant.index()];
                let linked = self
                    .arena
                    .nodes
                    .get(child)
                    .is_some_and(|c| c.parent == Some(key) && c.octant == octant);
                if !linked {
                    return Err(InvariantViolation::ParentMismatch { center: node.center });
                }

                let total = self.check_subtree(child, ancestors, reachable)?;
                if total > 0 {
                    occupancy.insert(octant.mask());
                }
                branch_count += total;
            }
            ancestors.pop();
        }

        if branch_count != node.branch_count {
            return Err(InvariantViolation::BranchCount {
                center: node.center,
                recorded: node.branch_count,
                actual: branch_count,
            });
        }
        if occupancy != node.occupancy {
            return Err(InvariantViolation::Occupancy {
                center: node.center,
                recorded: node.occupancy.bits(),
                actual: occupancy.bits(),
            });
        }
        Ok(node.entries.len() + branch_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_tree() -> Octree<usize> {
        let mut tree = Octree::new(16.0, Vec3::zeros(), 1.0, 16);
        tree.set_capacity(1).unwrap();
        tree.insert(0, Bounds::cube(Vec3::new(4.0, 4.0, 4.0), 1.0)).unwrap();
        tree.insert_point(1, Vec3::new(-4.0, -4.0, -4.0)).unwrap();
        tree.insert(2, Bounds::cube(Vec3::zeros(), 1.0)).unwrap();
        tree
    }

    #[test]
    fn test_stats() {
        let tree = split_tree();
        let stats = tree.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.nodes, 9);
        assert_eq!(stats.leaves, 8);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.max_entries_per_node, 1);
        assert_eq!(stats.overfull_nodes, 0);
        assert_eq!(stats.node_pool.live, 9);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 9);
        assert!(stats.to_string().starts_with("Octree: 3 entries in 9 nodes (8 leaves)"));
    }

    #[test]
    fn test_dump_lists_every_node() {
        let tree = split_tree();
        let dump = tree.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(
            lines[0],
            "[0] center=(0.00, 0.00, 0.00) length=16.00 local=1 branch=2 occupancy=00011000"
        );
        assert!(lines[1].starts_with("  [1] center=(-4.00, 4.00, -4.00) length=8.00 local=0"));
    }

    #[test]
    fn test_draw_visits_nodes_and_entries() {
        let tree = split_tree();
        let mut list = DrawList::new();
        tree.draw(&mut list);
        assert_eq!(list.of_kind(DebugBoxKind::Node).count(), 9);
        assert_eq!(list.of_kind(DebugBoxKind::Entry).count(), 2);
        assert_eq!(list.of_kind(DebugBoxKind::Point).count(), 1);
        assert_eq!(list.boxes[0].kind, DebugBoxKind::Node);
        assert_eq!(list.boxes[0].extents, Vec3::new(8.0, 8.0, 8.0));
        list.clear();
        assert!(list.boxes.is_empty());
    }

    #[test]
    fn test_validate_accepts_consistent_tree() {
        let tree = split_tree();
        assert_eq!(tree.validate(), Ok(()));
    }

    #[test]
    fn test_validate_catches_bad_branch_count() {
        let mut tree = split_tree();
        tree.arena.nodes[tree.root].branch_count += 1;
        assert!(matches!(
            tree.validate(),
            Err(InvariantViolation::BranchCount { recorded: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_validate_catches_bad_occupancy() {
        let mut tree = split_tree();
        tree.arena.nodes[tree.root].occupancy = ChildMask::OCTANT_3;
        assert!(matches!(
            tree.validate(),
            Err(InvariantViolation::Occupancy { recorded: 0b0000_1000, actual: 0b0001_1000, .. })
        ));
    }

    #[test]
    fn test_validate_catches_escaped_entry() {
        let mut tree = split_tree();
        let handle = tree.get_all_handles()[0];
        tree.arena.entries[handle].bounds = Bounds::cube(Vec3::new(100.0, 0.0, 0.0), 1.0);
        assert!(matches!(tree.validate(), Err(InvariantViolation::Containment { .. })));
    }
}
