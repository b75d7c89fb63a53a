//! Spatial queries
//!
//! Every query is a depth-first walk that skips a node when its loose
//! bounds fail a cheap test and skips children whose occupancy bit is clear.
//! Results are appended to a caller-provided vector so buffers can be reused
//! between frames; each query has a payload form and a handle form.

use std::ops::ControlFlow;

use crate::foundation::math::Vec3;
use crate::spatial::{Bounds, Entry, EntryHandle, Node, NodeKey, Octant, Octree, Ray};

impl<T> Octree<T> {
    fn walk<'a, V>(
        &'a self,
        key: NodeKey,
        enter: &impl Fn(&Node) -> bool,
        accept: &impl Fn(&Entry<T>) -> bool,
        visit: &mut V,
    ) -> ControlFlow<()>
    where
        V: FnMut(EntryHandle, &'a Entry<T>) -> ControlFlow<()>,
    {
        let node = &self.arena.nodes[key];
        if !enter(node) {
            return ControlFlow::Continue(());
        }

        for &handle in &node.entries {
            let entry = &self.arena.entries[handle];
            if accept(entry) {
                visit(handle, entry)?;
            }
        }

        if let Some(children) = &node.children {
            for octant in Octant::all().filter(|&octant| node.occupancy.has(octant)) {
                self.walk(children[octant.index()], enter, accept, visit)?;
            }
        }
        ControlFlow::Continue(())
    }

    fn any(&self, enter: &impl Fn(&Node) -> bool, accept: &impl Fn(&Entry<T>) -> bool) -> bool {
        self.walk(self.root, enter, accept, &mut |_, _| ControlFlow::Break(())).is_break()
    }

    fn collect<'a>(
        &'a self,
        enter: &impl Fn(&Node) -> bool,
        accept: &impl Fn(&Entry<T>) -> bool,
        result: &mut Vec<&'a T>,
    ) {
        let _ = self.walk(self.root, enter, accept, &mut |_, entry| {
            result.push(&entry.payload);
            ControlFlow::Continue(())
        });
    }

    fn collect_handles(
        &self,
        enter: &impl Fn(&Node) -> bool,
        accept: &impl Fn(&Entry<T>) -> bool,
        result: &mut Vec<EntryHandle>,
    ) {
        let _ = self.walk(self.root, enter, accept, &mut |handle, _| {
            result.push(handle);
            ControlFlow::Continue(())
        });
    }

    /// Check if anything overlaps `bounds`, stopping at the first hit
    pub fn is_colliding(&self, bounds: &Bounds) -> bool {
        self.any(
            &|node| node.loose_bounds.intersects(bounds),
            &|entry| entry.bounds.intersects(bounds),
        )
    }

    /// Collect every payload whose bounds overlap `bounds`
    pub fn get_colliding<'a>(&'a self, bounds: &Bounds, result: &mut Vec<&'a T>) {
        self.collect(
            &|node| node.loose_bounds.intersects(bounds),
            &|entry| entry.bounds.intersects(bounds),
            result,
        );
    }

    /// Collect the handle of every entry whose bounds overlap `bounds`
    pub fn get_colliding_handles(&self, bounds: &Bounds, result: &mut Vec<EntryHandle>) {
        self.collect_handles(
            &|node| node.loose_bounds.intersects(bounds),
            &|entry| entry.bounds.intersects(bounds),
            result,
        );
    }

    /// Check if the ray hits anything within `max_distance`
    pub fn is_colliding_ray(&self, ray: &Ray, max_distance: f32) -> bool {
        self.any(
            &|node| ray_hits(&node.loose_bounds, ray, max_distance),
            &|entry| ray_hits(&entry.bounds, ray, max_distance),
        )
    }

    /// Collect every payload the ray hits within `max_distance`
    ///
    /// Distances are measured in multiples of the ray direction.
    pub fn get_colliding_ray<'a>(&'a self, ray: &Ray, max_distance: f32, result: &mut Vec<&'a T>) {
        self.collect(
            &|node| ray_hits(&node.loose_bounds, ray, max_distance),
            &|entry| ray_hits(&entry.bounds, ray, max_distance),
            result,
        );
    }

    /// Collect the handle of every entry the ray hits within `max_distance`
    pub fn get_colliding_ray_handles(&self, ray: &Ray, max_distance: f32, result: &mut Vec<EntryHandle>) {
        self.collect_handles(
            &|node| ray_hits(&node.loose_bounds, ray, max_distance),
            &|entry| ray_hits(&entry.bounds, ray, max_distance),
            result,
        );
    }

    /// Collect every payload whose center lies within `max_distance` of the
    /// line through `ray`
    ///
    /// Nodes are culled with a ray test against their loose bounds grown by
    /// `max_distance`, which rejects everything behind the origin. Entries
    /// behind the origin may still be reported when they share a node with
    /// the ray.
    pub fn get_nearby<'a>(&'a self, ray: &Ray, max_distance: f32, result: &mut Vec<&'a T>) {
        let ray = ray.normalized();
        let max_sqr = max_distance * max_distance;
        self.collect(
            &|node| node.loose_bounds.intersect_ray_with_tolerance(&ray, max_distance).is_some(),
            &|entry| ray.sqr_distance_to_point(&entry.bounds.center()) <= max_sqr,
            result,
        );
    }

    /// Handle form of [`get_nearby`](Self::get_nearby)
    pub fn get_nearby_handles(&self, ray: &Ray, max_distance: f32, result: &mut Vec<EntryHandle>) {
        let ray = ray.normalized();
        let max_sqr = max_distance * max_distance;
        self.collect_handles(
            &|node| node.loose_bounds.intersect_ray_with_tolerance(&ray, max_distance).is_some(),
            &|entry| ray.sqr_distance_to_point(&entry.bounds.center()) <= max_sqr,
            result,
        );
    }

    /// Collect every payload whose center lies within `max_distance` of `point`
    pub fn get_nearby_point<'a>(&'a self, point: &Vec3, max_distance: f32, result: &mut Vec<&'a T>) {
        let max_sqr = max_distance * max_distance;
        self.collect(
            &|node| node.loose_bounds.sqr_distance_to_point(point) <= max_sqr,
            &|entry| (entry.bounds.center() - point).norm_squared() <= max_sqr,
            result,
        );
    }

    /// Handle form of [`get_nearby_point`](Self::get_nearby_point)
    pub fn get_nearby_point_handles(&self, point: &Vec3, max_distance: f32, result: &mut Vec<EntryHandle>) {
        let max_sqr = max_distance * max_distance;
        self.collect_handles(
            &|node| node.loose_bounds.sqr_distance_to_point(point) <= max_sqr,
            &|entry| (entry.bounds.center() - point).norm_squared() <= max_sqr,
            result,
        );
    }

    /// Every payload in the tree
    ///
    /// Detached entries are not included.
    pub fn get_all(&self) -> Vec<&T> {
        self.arena
            .collect_all(self.root)
            .into_iter()
            .map(|handle| &self.arena.entries[handle].payload)
            .collect()
    }

    /// Every entry handle in the tree
    pub fn get_all_handles(&self) -> Vec<EntryHandle> {
        self.arena.collect_all(self.root)
    }
}

fn ray_hits(bounds: &Bounds, ray: &Ray, max_distance: f32) -> bool {
    bounds.intersect_ray(ray).is_some_and(|distance| distance <= max_distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_boxes() -> Octree<&'static str> {
        let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 16);
        tree.insert("near", Bounds::cube(Vec3::new(5.0, 0.0, 0.0), 2.0)).unwrap();
        tree.insert("far", Bounds::cube(Vec3::new(30.0, 0.0, 0.0), 2.0)).unwrap();
        tree.insert("above", Bounds::cube(Vec3::new(5.0, 20.0, 0.0), 2.0)).unwrap();
        tree.insert_point("dot", Vec3::new(-10.0, -10.0, -10.0)).unwrap();
        tree
    }

    fn sorted(mut names: Vec<&&'static str>) -> Vec<&'static str> {
        names.sort_unstable();
        names.into_iter().copied().collect()
    }

    #[test]
    fn test_colliding_bounds() {
        let tree = tree_with_boxes();
        let query = Bounds::cube(Vec3::new(6.0, 1.0, 0.0), 2.0);
        assert!(tree.is_colliding(&query));

        let mut result = Vec::new();
        tree.get_colliding(&query, &mut result);
        assert_eq!(sorted(result), vec!["near"]);

        // Touching faces count as a collision
        let touching = Bounds::cube(Vec3::new(8.0, 0.0, 0.0), 4.0);
        assert!(tree.is_colliding(&touching));
        assert!(!tree.is_colliding(&Bounds::cube(Vec3::new(-30.0, 30.0, 30.0), 1.0)));
    }

    #[test]
    fn test_colliding_point_entry() {
        let tree = tree_with_boxes();
        let mut handles = Vec::new();
        tree.get_colliding_handles(&Bounds::cube(Vec3::new(-10.0, -10.0, -10.0), 0.5), &mut handles);
        assert_eq!(handles.len(), 1);
        assert_eq!(tree.get(handles[0]), Some(&"dot"));
    }

    #[test]
    fn test_ray_respects_max_distance() {
        let tree = tree_with_boxes();
        let ray = Ray::new(Vec3::new(-50.0, 0.0, 0.0), Vec3::x());

        let mut result = Vec::new();
        tree.get_colliding_ray(&ray, 60.0, &mut result);
        assert_eq!(sorted(result), vec!["near"]);

        let mut result = Vec::new();
        tree.get_colliding_ray(&ray, f32::INFINITY, &mut result);
        assert_eq!(sorted(result), vec!["far", "near"]);

        assert!(!tree.is_colliding_ray(&ray, 50.0));
        assert!(tree.is_colliding_ray(&ray, 54.0));
    }

    #[test]
    fn test_ray_from_inside_an_entry() {
        let tree = tree_with_boxes();
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::y());
        let mut handles = Vec::new();
        tree.get_colliding_ray_handles(&ray, 1.0, &mut handles);
        assert_eq!(handles.len(), 1);
        assert_eq!(tree.get(handles[0]), Some(&"near"));
    }

    #[test]
    fn test_nearby_ray() {
        let tree = tree_with_boxes();
        // Runs parallel to the x axis, 3 units above "near" and "far"
        let ray = Ray::from_raw(Vec3::new(-50.0, 3.0, 0.0), Vec3::new(10.0, 0.0, 0.0));

        let mut result = Vec::new();
        tree.get_nearby(&ray, 3.5, &mut result);
        assert_eq!(sorted(result), vec!["far", "near"]);

        let mut handles = Vec::new();
        tree.get_nearby_handles(&ray, 2.5, &mut handles);
        assert!(handles.is_empty());
    }

    #[test]
    fn test_nearby_point() {
        let tree = tree_with_boxes();
        let mut result = Vec::new();
        tree.get_nearby_point(&Vec3::new(5.0, 10.0, 0.0), 10.5, &mut result);
        assert_eq!(sorted(result), vec!["above", "near"]);

        let mut handles = Vec::new();
        tree.get_nearby_point_handles(&Vec3::new(5.0, 10.0, 0.0), 9.5, &mut handles);
        assert!(handles.is_empty());
    }

    #[test]
    fn test_get_all() {
        let tree = tree_with_boxes();
        assert_eq!(sorted(tree.get_all()), vec!["above", "dot", "far", "near"]);
        assert_eq!(tree.get_all_handles().len(), 4);
    }

    #[test]
    fn test_empty_tree_queries() {
        let tree: Octree<u32> = Octree::new(10.0, Vec3::zeros(), 1.0, 0);
        assert!(!tree.is_colliding(&Bounds::cube(Vec3::zeros(), 100.0)));
        assert!(!tree.is_colliding_ray(&Ray::new(Vec3::zeros(), Vec3::z()), 100.0));
        assert!(tree.get_all().is_empty());
    }
}
