//! Dynamic loose octree
//!
//! Each node's bounds are its cube scaled up by a looseness factor between
//! 1.0 and 2.0, so an entry near a dividing plane can still sink into a child
//! instead of getting stuck high up in the tree. The root grows on demand
//! when an entry lands outside it; subtrees merge back into a single leaf as
//! soon as their entry count drops to the node capacity.

use crate::config::OctreeConfig;
use crate::foundation::math::{utils, Vec3};
use crate::spatial::node::Arena;
use crate::spatial::{Bounds, Entry, EntryHandle, Node, NodeKey, Octant, OctreeError};

/// Loose octree over payloads of type `T`
///
/// Every entry is addressed through the [`EntryHandle`] returned by
/// [`insert`](Self::insert). Handles stay valid across splits, merges and
/// growth, and go stale once the entry is removed.
#[derive(Debug, Clone)]
pub struct Octree<T> {
    pub(crate) arena: Arena<T>,
    pub(crate) root: NodeKey,
    initial_length: f32,
    initial_center: Vec3,
    max_growth_attempts: u32,
}

impl<T> Octree<T> {
    /// Create an octree
    ///
    /// * `initial_world_size` - side length of the starting root
    /// * `initial_world_center` - center of the starting root
    /// * `looseness` - clamped to `[1.0, 2.0]`; 1.0 behaves like a normal octree
    /// * `capacity_hint` - expected number of entries, used to pre-size the pools
    ///
    /// Node capacity, max depth and growth attempts take their
    /// [`OctreeConfig`] defaults.
    pub fn new(initial_world_size: f32, initial_world_center: Vec3, looseness: f32, capacity_hint: usize) -> Self {
        Self::with_config(OctreeConfig {
            initial_world_size,
            initial_world_center,
            looseness,
            capacity_hint,
            ..OctreeConfig::default()
        })
    }

    /// Create an octree from a full configuration
    ///
    /// Out-of-range values are corrected with a warning, see
    /// [`OctreeConfig::validated`].
    pub fn with_config(config: OctreeConfig) -> Self {
        let config = config.validated();
        let mut arena = Arena::new(config.looseness, config.capacity, config.max_depth, config.capacity_hint);
        let root = arena.new_node(config.initial_world_center, config.initial_world_size, None, Octant::default());

        log::debug!(
            "Created octree of length {} at {:?} (looseness {}, capacity {}, max depth {})",
            config.initial_world_size,
            config.initial_world_center,
            config.looseness,
            config.capacity,
            config.max_depth
        );

        Self {
            arena,
            root,
            initial_length: config.initial_world_size,
            initial_center: config.initial_world_center,
            max_growth_attempts: config.max_growth_attempts,
        }
    }

    /// Insert a payload with the given bounds
    ///
    /// # Errors
    ///
    /// Returns [`OctreeError::GrowthExhausted`] when the bounds are not finite
    /// or the root could not grow enough to contain them. The payload is
    /// dropped and the tree stays valid.
    pub fn insert(&mut self, payload: T, bounds: Bounds) -> Result<EntryHandle, OctreeError> {
        self.insert_entry(Entry::new(payload, bounds, false))
    }

    /// Insert a payload at a single point
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn insert_point(&mut self, payload: T, point: Vec3) -> Result<EntryHandle, OctreeError> {
        self.insert_entry(Entry::new(payload, Bounds::point(point), true))
    }

    fn insert_entry(&mut self, entry: Entry<T>) -> Result<EntryHandle, OctreeError> {
        let handle = self.arena.entries.insert(entry);
        if let Err(err) = self.place(handle) {
            self.arena.entries.take(handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Attach a detached entry, growing the root as often as allowed
    fn place(&mut self, handle: EntryHandle) -> Result<(), OctreeError> {
        let bounds = self.arena.entries.get(handle).ok_or(OctreeError::StaleHandle)?.bounds;
        if !bounds.is_finite() {
            log::error!("Rejected entry with non-finite bounds {:?}", bounds);
            return Err(OctreeError::GrowthExhausted { bounds, attempts: 0 });
        }

        let mut attempts = 0;
        while !self.arena.try_insert(self.root, handle) {
            if attempts >= self.max_growth_attempts {
                log::error!(
                    "Aborted insert of entry with bounds {:?} after {} attempts at growing the octree",
                    bounds,
                    attempts
                );
                return Err(OctreeError::GrowthExhausted { bounds, attempts });
            }
            let direction = bounds.center() - self.arena.nodes[self.root].center;
            self.grow(&direction);
            attempts += 1;
        }
        Ok(())
    }

    /// Double the root towards `direction`
    ///
    /// A root holding entries becomes one child of the new root; an empty
    /// root is resized in place.
    fn grow(&mut self, direction: &Vec3) {
        let old_root = self.root;
        let (old_center, old_length, old_total) = {
            let node = &self.arena.nodes[old_root];
            (node.center, node.base_length, node.total())
        };
        let new_length = old_length * 2.0;
        let new_center = old_center + utils::axis_signs(direction) * (old_length * 0.5);

        if old_total == 0 {
            if !self.arena.nodes[old_root].is_leaf() {
                self.arena.get_all(old_root, true);
            }
            let looseness = self.arena.looseness;
            self.arena.nodes[old_root].reset(new_center, new_length, looseness, None, Octant::default());
        } else {
            let new_root = self.arena.new_node(new_center, new_length, None, Octant::default());
            let root_octant = Octant::best_fit(&new_center, &old_center);
            let children: [NodeKey; Octant::COUNT] = std::array::from_fn(|i| {
                let octant = Octant::new(i);
                if octant == root_octant {
                    old_root
                } else {
                    self.arena.new_node(new_center + octant.offset(new_length * 0.25), old_length, Some(new_root), octant)
                }
            });

            let old = &mut self.arena.nodes[old_root];
            old.parent = Some(new_root);
            old.octant = root_octant;

            let node = &mut self.arena.nodes[new_root];
            node.set_children(&children);
            node.branch_count = old_total;
            node.occupancy = root_octant.mask();
            self.root = new_root;
        }

        log::debug!("Grew octree root to length {} at {:?}", new_length, new_center);
    }

    /// Remove an entry and return its payload
    ///
    /// Detached entries (see [`detach_all`](Self::detach_all)) can be removed
    /// too; they leave no trace in the node counts.
    ///
    /// # Errors
    ///
    /// Returns [`OctreeError::StaleHandle`] if the entry was already removed.
    pub fn remove(&mut self, handle: EntryHandle) -> Result<T, OctreeError> {
        self.arena.detach(handle)?;
        let entry = self.arena.entries.take(handle).ok_or(OctreeError::StaleHandle)?;
        Ok(entry.into_payload())
    }

    /// Move an entry to new bounds, keeping its handle
    ///
    /// # Errors
    ///
    /// [`OctreeError::StaleHandle`] for a removed entry. If the new bounds
    /// cannot be placed the entry keeps its old bounds and the placement
    /// error is returned.
    pub fn relocate(&mut self, handle: EntryHandle, bounds: Bounds) -> Result<(), OctreeError> {
        self.move_entry(handle, bounds, false)
    }

    /// Move an entry to a single point, keeping its handle
    ///
    /// # Errors
    ///
    /// Same as [`relocate`](Self::relocate).
    pub fn relocate_point(&mut self, handle: EntryHandle, point: Vec3) -> Result<(), OctreeError> {
        self.move_entry(handle, Bounds::point(point), true)
    }

    fn move_entry(&mut self, handle: EntryHandle, bounds: Bounds, is_point: bool) -> Result<(), OctreeError> {
        let was_attached = self.arena.entries.get(handle).ok_or(OctreeError::StaleHandle)?.is_attached();
        self.arena.detach(handle)?;

        let entry = &mut self.arena.entries[handle];
        let previous = (entry.bounds, entry.is_point);
        entry.bounds = bounds;
        entry.is_point = is_point;

        if let Err(err) = self.place(handle) {
            let entry = &mut self.arena.entries[handle];
            (entry.bounds, entry.is_point) = previous;
            if was_attached {
                // The tree only grew, so the old bounds still fit
                self.place(handle)?;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Detach every entry, collapsing the tree into an empty root
    ///
    /// The entries stay alive and their handles stay valid, but queries no
    /// longer see them until they are put back with
    /// [`reinsert`](Self::reinsert) or dropped with [`remove`](Self::remove).
    pub fn detach_all(&mut self) -> Vec<EntryHandle> {
        self.arena.get_all(self.root, true)
    }

    /// Put a detached entry back into the tree
    ///
    /// Does nothing for an entry that is already in the tree.
    ///
    /// # Errors
    ///
    /// [`OctreeError::StaleHandle`] for a removed entry, or the placement
    /// error from [`insert`](Self::insert).
    pub fn reinsert(&mut self, handle: EntryHandle) -> Result<(), OctreeError> {
        if self.arena.entries.get(handle).ok_or(OctreeError::StaleHandle)?.is_attached() {
            return Ok(());
        }
        self.place(handle)
    }

    /// Change how many entries a leaf holds before splitting
    ///
    /// Rebuilds the tree from scratch. Handles stay valid.
    ///
    /// # Errors
    ///
    /// Propagates placement errors, which cannot occur for entries that were
    /// already in the tree.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), OctreeError> {
        let capacity = if capacity == 0 {
            log::warn!("Node capacity must be at least 1. Adjusted to 1");
            1
        } else {
            capacity
        };
        if capacity == self.arena.capacity {
            return Ok(());
        }

        self.arena.capacity = capacity;
        let handles = self.detach_all();
        log::debug!("Rebuilding octree with capacity {} ({} entries)", capacity, handles.len());
        for handle in handles {
            self.place(handle)?;
        }
        Ok(())
    }

    /// Remove every entry and shrink the root back to its initial size
    pub fn clear(&mut self) {
        self.drain();
    }

    /// Remove every entry, returning the payloads in no particular order
    pub fn drain(&mut self) -> Vec<T> {
        self.arena.get_all(self.root, true);
        let looseness = self.arena.looseness;
        self.arena.nodes[self.root].reset(self.initial_center, self.initial_length, looseness, None, Octant::default());
        self.arena.entries.drain().map(|(_, entry)| entry.into_payload()).collect()
    }

    /// Get the payload of an entry
    pub fn get(&self, handle: EntryHandle) -> Option<&T> {
        self.arena.entries.get(handle).map(Entry::payload)
    }

    /// Get a mutable reference to the payload of an entry
    ///
    /// Bounds cannot change through this; use [`relocate`](Self::relocate).
    pub fn get_mut(&mut self, handle: EntryHandle) -> Option<&mut T> {
        self.arena.entries.get_mut(handle).map(|entry| &mut entry.payload)
    }

    /// Get an entry with its bounds and placement
    pub fn entry(&self, handle: EntryHandle) -> Option<&Entry<T>> {
        self.arena.entries.get(handle)
    }

    /// Bounds an entry was inserted or relocated with
    pub fn bounds_of(&self, handle: EntryHandle) -> Option<Bounds> {
        self.arena.entries.get(handle).map(|entry| entry.bounds)
    }

    /// Whether an entry was inserted as a point
    pub fn is_point(&self, handle: EntryHandle) -> Option<bool> {
        self.arena.entries.get(handle).map(Entry::is_point)
    }

    /// Check whether a handle still refers to a live entry
    pub fn contains(&self, handle: EntryHandle) -> bool {
        self.arena.entries.contains_key(handle)
    }

    /// Iterate over every live entry, attached or not
    pub fn iter(&self) -> impl Iterator<Item = (EntryHandle, &T)> {
        self.arena.entries.iter().map(|(handle, entry)| (handle, entry.payload()))
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.arena.entries.len()
    }

    /// Check if the octree holds no entries
    pub fn is_empty(&self) -> bool {
        self.arena.entries.is_empty()
    }

    /// Loose bounds of the root; every attached entry lies strictly inside
    pub fn max_bounds(&self) -> Bounds {
        self.arena.nodes[self.root].loose_bounds
    }

    /// The root node
    pub fn root(&self) -> &Node {
        &self.arena.nodes[self.root]
    }

    /// Look up a node by key
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.arena.nodes.get(key)
    }

    /// Looseness factor applied to every node
    pub fn looseness(&self) -> f32 {
        self.arena.looseness
    }

    /// Entries a leaf holds before splitting
    pub fn capacity(&self) -> usize {
        self.arena.capacity
    }

    /// Deepest level a node may split to
    pub fn max_depth(&self) -> u32 {
        self.arena.max_depth
    }
}

impl<T> Default for Octree<T> {
    fn default() -> Self {
        Self::with_config(OctreeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(x: f32, y: f32, z: f32) -> Bounds {
        Bounds::cube(Vec3::new(x, y, z), 1.0)
    }

    #[test]
    fn test_new_clamps_looseness() {
        let tight: Octree<u32> = Octree::new(10.0, Vec3::zeros(), 0.5, 0);
        assert_eq!(tight.looseness(), 1.0);
        let loose: Octree<u32> = Octree::new(10.0, Vec3::zeros(), 3.0, 0);
        assert_eq!(loose.looseness(), 2.0);
        assert_relative_eq!(loose.max_bounds().size(), utils::splat(20.0));
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let a = tree.insert("a", unit_box(1.0, 2.0, 3.0)).unwrap();
        let b = tree.insert_point("b", Vec3::new(-10.0, 0.0, 5.0)).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(a), Some(&"a"));
        assert_eq!(tree.is_point(a), Some(false));
        assert_eq!(tree.is_point(b), Some(true));
        assert_eq!(tree.bounds_of(b).unwrap().size(), Vec3::zeros());
        assert!(tree.entry(a).unwrap().is_attached());

        *tree.get_mut(a).unwrap() = "c";
        assert_eq!(tree.get(a), Some(&"c"));
    }

    #[test]
    fn test_remove_returns_payload() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let handle = tree.insert(String::from("payload"), unit_box(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(tree.remove(handle).unwrap(), "payload");
        assert!(!tree.contains(handle));
        assert!(tree.is_empty());
        assert_eq!(tree.remove(handle), Err(OctreeError::StaleHandle));
    }

    #[test]
    fn test_empty_root_grows_in_place() {
        let mut tree = Octree::new(10.0, Vec3::zeros(), 1.0, 0);
        let handle = tree.insert_point(0, Vec3::new(12.0, 1.0, 1.0)).unwrap();

        assert_eq!(tree.arena.nodes.len(), 1);
        let root = tree.root();
        assert!(root.is_leaf());
        assert_eq!(root.base_length(), 20.0);
        assert_eq!(root.center(), Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(root.entries(), &[handle]);
    }

    #[test]
    fn test_growth_reparents_old_root() {
        let mut tree = Octree::new(10.0, Vec3::zeros(), 1.0, 0);
        let inside = tree.insert_point(0, Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let old_root = tree.root;

        let outside = tree.insert_point(1, Vec3::new(-7.0, 2.0, 2.0)).unwrap();
        let root = tree.root();
        assert_ne!(tree.root, old_root);
        assert_eq!(root.base_length(), 20.0);
        assert_eq!(root.center(), Vec3::new(-5.0, 5.0, 5.0));

        // Old center is +X, -Y, -Z of the new one
        let children = root.children().unwrap();
        assert_eq!(children[5], old_root);
        assert_eq!(tree.node(old_root).unwrap().parent(), Some(tree.root));
        assert_eq!(tree.entry(inside).unwrap().owner, Some(old_root));
        assert!(tree.max_bounds().contains_point(&Vec3::new(-7.0, 2.0, 2.0)));
        assert!(tree.entry(outside).unwrap().is_attached());
        assert_eq!(root.total(), 2);
    }

    #[test]
    fn test_non_finite_bounds_are_rejected() {
        let mut tree = Octree::new(10.0, Vec3::zeros(), 1.0, 0);
        let err = tree.insert_point(0, Vec3::new(f32::NAN, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, OctreeError::GrowthExhausted { attempts: 0, .. }));
        assert!(tree.is_empty());
        assert_eq!(tree.root().base_length(), 10.0);
    }

    #[test]
    fn test_growth_attempts_are_bounded() {
        let mut tree = Octree::with_config(OctreeConfig {
            initial_world_size: 1.0,
            max_growth_attempts: 3,
            ..OctreeConfig::default()
        });
        let err = tree.insert_point(0, Vec3::new(1000.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, OctreeError::GrowthExhausted { attempts: 3, .. }));
        assert!(tree.is_empty());
        assert_eq!(tree.arena.nodes.len(), 1);
    }

    #[test]
    fn test_relocate_keeps_handle() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let handle = tree.insert(7, unit_box(10.0, 10.0, 10.0)).unwrap();
        tree.relocate(handle, unit_box(-20.0, 5.0, 0.0)).unwrap();
        assert_eq!(tree.bounds_of(handle).unwrap().center(), Vec3::new(-20.0, 5.0, 0.0));
        assert_eq!(tree.get(handle), Some(&7));

        tree.relocate_point(handle, Vec3::new(300.0, 0.0, 0.0)).unwrap();
        assert_eq!(tree.is_point(handle), Some(true));
        assert!(tree.max_bounds().contains_point(&Vec3::new(300.0, 0.0, 0.0)));
    }

    #[test]
    fn test_failed_relocate_restores_bounds() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let handle = tree.insert(7, unit_box(10.0, 10.0, 10.0)).unwrap();
        let err = tree.relocate_point(handle, Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert!(err.is_err());
        assert_eq!(tree.bounds_of(handle), Some(unit_box(10.0, 10.0, 10.0)));
        assert!(tree.entry(handle).unwrap().is_attached());
    }

    #[test]
    fn test_detach_all_and_reinsert() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let handles: Vec<_> = (0..20).map(|i| tree.insert(i, unit_box(i as f32, 0.0, 0.0)).unwrap()).collect();

        let detached = tree.detach_all();
        assert_eq!(detached.len(), 20);
        assert_eq!(tree.len(), 20);
        assert_eq!(tree.root().total(), 0);
        assert!(tree.root().is_leaf());

        // Removing a detached entry does not touch node counts
        assert_eq!(tree.remove(handles[0]), Ok(0));
        for &handle in &handles[1..] {
            tree.reinsert(handle).unwrap();
        }
        assert_eq!(tree.root().total(), 19);
        tree.reinsert(handles[1]).unwrap();
        assert_eq!(tree.root().total(), 19);
        assert_eq!(tree.reinsert(handles[0]), Err(OctreeError::StaleHandle));
    }

    #[test]
    fn test_set_capacity_rebuilds() {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        let handles: Vec<_> = (0..16)
            .map(|i| tree.insert(i, unit_box(-30.0 + i as f32 * 4.0, 20.0, -20.0)).unwrap())
            .collect();
        assert!(!tree.root().is_leaf());

        tree.set_capacity(32).unwrap();
        assert_eq!(tree.capacity(), 32);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().entries().len(), 16);
        for (i, &handle) in handles.iter().enumerate() {
            assert_eq!(tree.get(handle), Some(&i));
        }
    }

    #[test]
    fn test_drain_resets_root() {
        let mut tree = Octree::new(10.0, Vec3::zeros(), 1.0, 0);
        tree.insert_point(1, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        tree.insert_point(2, Vec3::new(50.0, 0.0, 0.0)).unwrap();
        assert!(tree.root().base_length() > 10.0);

        let mut payloads = tree.drain();
        payloads.sort_unstable();
        assert_eq!(payloads, vec![1, 2]);
        assert!(tree.is_empty());
        assert_eq!(tree.arena.nodes.len(), 1);
        assert_eq!(tree.root().base_length(), 10.0);
        assert_eq!(tree.root().center(), Vec3::zeros());

        tree.insert_point(3, Vec3::zeros()).unwrap();
        tree.clear();
        assert!(tree.is_empty());
    }
}
