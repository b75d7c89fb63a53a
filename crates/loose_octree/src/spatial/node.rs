//! Octree nodes and the arena that links them
//!
//! Nodes never hold references to each other. Every parent, child and entry
//! link is a generational key into one of the two pools owned by [`Arena`],
//! so the whole tree can be restructured (split, merged, regrown) with plain
//! key updates and no reference cycles.

use crate::foundation::math::{utils, Vec3};
use crate::spatial::{Bounds, ChildMask, Entry, EntryHandle, NodeKey, ObjectPool, Octant, OctreeError, Recycle};

/// A cube region of the octree
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) center: Vec3,
    /// Un-loosened side length
    pub(crate) base_length: f32,
    pub(crate) loose_bounds: Bounds,
    pub(crate) parent: Option<NodeKey>,
    /// Position of this node within its parent
    pub(crate) octant: Octant,
    pub(crate) children: Option<[NodeKey; Octant::COUNT]>,
    pub(crate) entries: Vec<EntryHandle>,
    /// Entries stored anywhere below this node, local entries excluded
    pub(crate) branch_count: usize,
    pub(crate) occupancy: ChildMask,
}

impl Node {
    /// Center of the node
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Side length before looseness is applied
    pub fn base_length(&self) -> f32 {
        self.base_length
    }

    /// Bounds an entry must fit strictly inside to live in this node
    pub fn loose_bounds(&self) -> &Bounds {
        &self.loose_bounds
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Where this node sits within its parent
    pub fn octant(&self) -> Octant {
        self.octant
    }

    /// Child keys in octant order, `None` for a leaf
    pub fn children(&self) -> Option<&[NodeKey; Octant::COUNT]> {
        self.children.as_ref()
    }

    /// Entries stored directly in this node
    pub fn entries(&self) -> &[EntryHandle] {
        &self.entries
    }

    /// Number of entries stored below this node
    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    /// Children whose subtree holds at least one entry
    pub fn occupancy(&self) -> ChildMask {
        self.occupancy
    }

    /// Local plus descendant entries
    pub fn total(&self) -> usize {
        self.entries.len() + self.branch_count
    }

    /// Check if this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub(crate) fn reset(&mut self, center: Vec3, base_length: f32, looseness: f32, parent: Option<NodeKey>, octant: Octant) {
        self.center = center;
        self.base_length = base_length;
        self.loose_bounds = Bounds::new(center, utils::splat(base_length * looseness));
        self.parent = parent;
        self.octant = octant;
        self.children = None;
        self.entries.clear();
        self.branch_count = 0;
        self.occupancy = ChildMask::empty();
    }

    /// Install the 8 children of this node
    ///
    /// # Panics
    ///
    /// Panics unless exactly 8 keys are given.
    pub(crate) fn set_children(&mut self, children: &[NodeKey]) {
        assert!(
            children.len() == Octant::COUNT,
            "a node needs exactly 8 children, got {}",
            children.len()
        );
        self.children = Some(std::array::from_fn(|i| children[i]));
    }
}

impl Recycle for Node {
    fn recycle(&mut self) {
        self.parent = None;
        self.children = None;
        self.entries.clear();
        self.branch_count = 0;
        self.occupancy = ChildMask::empty();
    }
}

/// Node and entry storage plus the structural operations on them
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    pub(crate) nodes: ObjectPool<NodeKey, Node>,
    pub(crate) entries: ObjectPool<EntryHandle, Entry<T>>,
    pub(crate) looseness: f32,
    /// Local entries a leaf holds before it splits
    pub(crate) capacity: usize,
    pub(crate) max_depth: u32,
    /// Scratch buffers reused across merges
    orphans: Vec<EntryHandle>,
    pending: Vec<NodeKey>,
}

impl<T> Arena<T> {
    pub(crate) fn new(looseness: f32, capacity: usize, max_depth: u32, capacity_hint: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: ObjectPool::with_capacity(capacity_hint.div_ceil(capacity).max(1)),
            entries: ObjectPool::with_capacity(capacity_hint),
            looseness,
            capacity,
            max_depth,
            orphans: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) fn new_node(&mut self, center: Vec3, base_length: f32, parent: Option<NodeKey>, octant: Octant) -> NodeKey {
        let looseness = self.looseness;
        self.nodes.acquire(|node| node.reset(center, base_length, looseness, parent, octant))
    }

    /// Place an entry somewhere under `root`
    ///
    /// Returns `false` when the root's loose bounds do not strictly contain
    /// the entry; the caller grows the tree and retries.
    pub(crate) fn try_insert(&mut self, root: NodeKey, handle: EntryHandle) -> bool {
        let Some(entry) = self.entries.get(handle) else {
            return false;
        };
        let bounds = entry.bounds;
        if !self.nodes[root].loose_bounds.contains(&bounds) {
            return false;
        }

        let target = bounds.center();
        let mut current = root;
        let mut depth = 0;
        loop {
            let node = &self.nodes[current];
            if node.is_leaf() && node.entries.len() >= self.capacity {
                if depth < self.max_depth {
                    self.split(current);
                } else {
                    log::trace!(
                        "Node at {:?} is at max depth {} and holds {} entries, storing anyway",
                        node.center,
                        depth,
                        node.entries.len()
                    );
                }
            }

            let node = &self.nodes[current];
            let Some(children) = node.children else {
                break;
            };
            let child = children[Octant::best_fit(&node.center, &target).index()];
            if !self.nodes[child].loose_bounds.contains(&bounds) {
                break; // Straddles the child boundaries
            }
            current = child;
            depth += 1;
        }

        self.attach(current, handle);
        true
    }

    /// Append an entry to a node and count it in every ancestor
    fn attach(&mut self, key: NodeKey, handle: EntryHandle) {
        let node = &mut self.nodes[key];
        let slot = node.entries.len();
        node.entries.push(handle);
        self.entries[handle].attach(key, slot);

        let mut child = key;
        while let Some(parent) = self.nodes[child].parent {
            let octant = self.nodes[child].octant;
            let parent_node = &mut self.nodes[parent];
            parent_node.branch_count += 1;
            parent_node.occupancy.insert(octant.mask());
            child = parent;
        }
    }

    /// Turn a leaf into a branch, pushing down entries that fit a child
    fn split(&mut self, key: NodeKey) {
        let (center, base_length) = {
            let node = &self.nodes[key];
            (node.center, node.base_length)
        };
        let quarter = base_length * 0.25;
        let children: [NodeKey; Octant::COUNT] = std::array::from_fn(|i| {
            let octant = Octant::new(i);
            self.new_node(center + octant.offset(quarter), base_length * 0.5, Some(key), octant)
        });
        self.nodes[key].set_children(&children);

        let mut local = std::mem::take(&mut self.nodes[key].entries);
        let before = local.len();
        let mut occupied = ChildMask::empty();
        local.retain(|&handle| {
            let bounds = self.entries[handle].bounds;
            let octant = Octant::best_fit(&center, &bounds.center());
            let child = children[octant.index()];
            if !self.nodes[child].loose_bounds.contains(&bounds) {
                return true;
            }
            let child_node = &mut self.nodes[child];
            let slot = child_node.entries.len();
            child_node.entries.push(handle);
            self.entries[handle].attach(child, slot);
            occupied.insert(octant.mask());
            false
        });
        for (slot, &handle) in local.iter().enumerate() {
            self.entries[handle].slot = slot;
        }

        let moved = before - local.len();
        let node = &mut self.nodes[key];
        node.entries = local;
        node.branch_count += moved;
        node.occupancy |= occupied;

        log::debug!(
            "Split node at {:?} (length {}): moved {} of {} entries into children",
            center,
            base_length,
            moved,
            before
        );
    }

    /// Take an entry out of its node, update ancestor counts and merge back
    ///
    /// Entries that are already detached are left alone.
    pub(crate) fn detach(&mut self, handle: EntryHandle) -> Result<(), OctreeError> {
        let entry = self.entries.get(handle).ok_or(OctreeError::StaleHandle)?;
        let Some(owner) = entry.owner else {
            return Ok(());
        };
        let slot = entry.slot;

        let node = &mut self.nodes[owner];
        node.entries.swap_remove(slot);
        if let Some(&moved) = node.entries.get(slot) {
            self.entries[moved].slot = slot;
        }
        self.entries[handle].detach();

        let mut child = owner;
        while let Some(parent) = self.nodes[child].parent {
            let child_node = &self.nodes[child];
            let emptied = child_node.total() == 0;
            let octant = child_node.octant;
            let parent_node = &mut self.nodes[parent];
            parent_node.branch_count -= 1;
            if emptied {
                parent_node.occupancy.remove(octant.mask());
            }
            child = parent;
        }

        self.merge_highest(owner);
        Ok(())
    }

    /// Merge the highest node on the path from `start` that fits in one leaf
    fn merge_highest(&mut self, start: NodeKey) {
        let mut target = None;
        let mut current = Some(start);
        while let Some(key) = current {
            let node = &self.nodes[key];
            if node.total() > self.capacity {
                break;
            }
            target = Some(key);
            current = node.parent;
        }

        if let Some(key) = target.filter(|&key| !self.nodes[key].is_leaf()) {
            self.merge(key);
        }
    }

    /// Pull every descendant entry into this node and drop its children
    fn merge(&mut self, key: NodeKey) {
        let released = self.dissolve_children(key);
        let mut orphans = std::mem::take(&mut self.orphans);
        let adopted = orphans.len();

        let node = &mut self.nodes[key];
        for handle in orphans.drain(..) {
            let slot = node.entries.len();
            node.entries.push(handle);
            self.entries[handle].attach(key, slot);
        }
        self.orphans = orphans;

        log::debug!(
            "Merged {} nodes into node at {:?}, adopting {} entries",
            released,
            self.nodes[key].center,
            adopted
        );
    }

    /// Release every descendant of a node, collecting their entries as orphans
    ///
    /// Returns the number of released nodes. The node itself becomes a leaf.
    fn dissolve_children(&mut self, key: NodeKey) -> usize {
        let Some(children) = self.nodes[key].children.take() else {
            return 0;
        };

        let mut pending = std::mem::take(&mut self.pending);
        pending.extend_from_slice(&children);
        let mut released = 0;
        while let Some(child) = pending.pop() {
            let node = &mut self.nodes[child];
            self.orphans.append(&mut node.entries);
            if let Some(grandchildren) = node.children.take() {
                pending.extend_from_slice(&grandchildren);
            }
            self.nodes.release(child);
            released += 1;
        }
        self.pending = pending;

        let node = &mut self.nodes[key];
        node.branch_count = 0;
        node.occupancy = ChildMask::empty();
        released
    }

    /// Every entry under `root`
    ///
    /// With `remove_from_nodes` each entry is detached and the subtree
    /// collapses into an empty leaf. Detached entries stay in the entry pool
    /// until the caller reinserts or removes them.
    pub(crate) fn get_all(&mut self, root: NodeKey, remove_from_nodes: bool) -> Vec<EntryHandle> {
        if !remove_from_nodes {
            return self.collect_all(root);
        }

        let released = self.dissolve_children(root);
        let mut detached = std::mem::take(&mut self.orphans);
        detached.append(&mut self.nodes[root].entries);
        for &handle in &detached {
            self.entries[handle].detach();
        }

        log::debug!("Collapsed {} nodes and detached {} entries", released, detached.len());
        detached
    }

    /// Every entry under `root`, leaving the tree as is
    pub(crate) fn collect_all(&self, root: NodeKey) -> Vec<EntryHandle> {
        let mut all = Vec::with_capacity(self.nodes[root].total());
        self.for_each_node(root, |_, node, _| all.extend_from_slice(&node.entries));
        all
    }

    /// Visit `root` and its descendants depth-first, children in octant order
    pub(crate) fn for_each_node(&self, root: NodeKey, mut visit: impl FnMut(NodeKey, &Node, u32)) {
        let mut stack = vec![(root, 0)];
        while let Some((key, depth)) = stack.pop() {
            let node = &self.nodes[key];
            visit(key, node, depth);
            if let Some(children) = &node.children {
                stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
            }
        }
    }
}
