//! # Loose Octree
//!
//! A dynamic loose octree for broad-phase spatial queries over axis-aligned
//! bounding boxes and points.
//!
//! ## Features
//!
//! - **Loose Bounds**: nodes overlap by a configurable factor so entries
//!   near dividing planes still sink deep into the tree
//! - **Dynamic Growth**: the root doubles towards entries inserted outside it
//! - **Split and Merge**: leaves split past a capacity and subtrees collapse
//!   back as entries are removed
//! - **Stable Handles**: generational handles survive restructuring and go
//!   stale on removal
//! - **Queries**: AABB overlap, ray casts, and proximity to a ray or a point
//!
//! ## Quick Start
//!
//! ```rust
//! use loose_octree::prelude::*;
//!
//! fn main() -> Result<(), OctreeError> {
//!     let mut tree = Octree::new(100.0, Vec3::zeros(), 1.25, 64);
//!
//!     let ship = tree.insert("ship", Bounds::cube(Vec3::new(10.0, 0.0, 0.0), 2.0))?;
//!     tree.insert_point("beacon", Vec3::new(-20.0, 5.0, 0.0))?;
//!
//!     let mut hits = Vec::new();
//!     tree.get_colliding(&Bounds::cube(Vec3::new(11.0, 0.0, 0.0), 1.0), &mut hits);
//!     assert_eq!(hits, vec![&"ship"]);
//!
//!     let ray = Ray::new(Vec3::new(-50.0, 0.0, 0.0), Vec3::x());
//!     assert!(tree.is_colliding_ray(&ray, 100.0));
//!
//!     assert_eq!(tree.remove(ship)?, "ship");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod foundation;
pub mod spatial;

/// Common imports for octree users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, OctreeConfig},
        foundation::math::Vec3,
        spatial::{Bounds, DebugDraw, EntryHandle, InvariantViolation, Octree, OctreeError, OctreeStats, Ray},
    };
}
