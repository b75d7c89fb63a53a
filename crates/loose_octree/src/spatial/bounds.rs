//! Axis-aligned bounding boxes
//!
//! [`Bounds`] is immutable once built: the derived `min` and `max` corners
//! are computed on construction and cached, since every tree operation reads
//! them far more often than boxes are created.

use approx::{AbsDiffEq, RelativeEq};

use crate::foundation::math::{utils, Vec3};
use crate::spatial::Ray;

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    center: Vec3,
    size: Vec3,
    min: Vec3,
    max: Vec3,
}

impl Bounds {
    /// Create bounds from a center and full size
    pub fn new(center: Vec3, size: Vec3) -> Self {
        let extents = size * 0.5;
        Self {
            center,
            size,
            min: center - extents,
            max: center + extents,
        }
    }

    /// Create a cube with the given side length
    pub fn cube(center: Vec3, length: f32) -> Self {
        Self::new(center, utils::splat(length))
    }

    /// Create zero-size bounds at a point
    pub fn point(point: Vec3) -> Self {
        Self::new(point, Vec3::zeros())
    }

    /// Create bounds from min and max corners
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self::new((min + max) * 0.5, max - min)
    }

    /// Get the center of the bounds
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Get the full size of the bounds
    pub fn size(&self) -> Vec3 {
        self.size
    }

    /// Get the extents (half-size) of the bounds
    pub fn extents(&self) -> Vec3 {
        self.size * 0.5
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Check whether every coordinate is finite
    pub fn is_finite(&self) -> bool {
        utils::is_finite(&self.min) && utils::is_finite(&self.max)
    }

    /// Copy of these bounds grown by `amount` on every side
    #[must_use]
    pub fn expanded(&self, amount: f32) -> Self {
        Self::new(self.center, self.size + utils::splat(amount * 2.0))
    }

    /// Check if `inner` lies strictly inside these bounds
    ///
    /// Touching a face counts as outside, so an entry sitting exactly on a
    /// node boundary never belongs to both sides.
    pub fn contains(&self, inner: &Bounds) -> bool {
        if inner.min.x <= self.min.x || inner.max.x >= self.max.x {
            return false;
        }
        if inner.min.y <= self.min.y || inner.max.y >= self.max.y {
            return false;
        }
        if inner.min.z <= self.min.z || inner.max.z >= self.max.z {
            return false;
        }
        true
    }

    /// Check if a point lies strictly inside these bounds
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x > self.min.x && point.x < self.max.x &&
        point.y > self.min.y && point.y < self.max.y &&
        point.z > self.min.z && point.z < self.max.z
    }

    /// Check if these bounds intersect another (touching counts)
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Squared distance from a point to the closest point of these bounds
    ///
    /// Zero when the point is inside.
    pub fn sqr_distance_to_point(&self, point: &Vec3) -> f32 {
        let closest = Vec3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        );
        (closest - point).norm_squared()
    }

    /// Test ray intersection using the slab method
    ///
    /// Returns the distance along the ray to the entry point, which is
    /// negative when the origin is already inside. `None` when the ray misses
    /// or the box lies entirely behind the origin.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        slab_intersection(&self.min, &self.max, ray)
    }

    /// Test ray intersection against these bounds grown by `max_distance`
    ///
    /// A cheap stand-in for "does the ray pass within `max_distance` of the
    /// box"; corners make it slightly generous.
    pub fn intersect_ray_with_tolerance(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        let grow = utils::splat(max_distance);
        slab_intersection(&(self.min - grow), &(self.max + grow), ray)
    }
}

/// Based on "An Efficient and Robust Ray-Box Intersection Algorithm"
///
/// Zero direction components produce infinite reciprocals; `f32::min` and
/// `f32::max` discard the NaNs that appear when the origin lies exactly on a
/// slab plane, so axis-parallel rays never panic and simply miss.
fn slab_intersection(min: &Vec3, max: &Vec3, ray: &Ray) -> Option<f32> {
    let inv_dir = ray.direction.map(|d| 1.0 / d);
    let origin = ray.origin;

    let t1 = (min.x - origin.x) * inv_dir.x;
    let t2 = (max.x - origin.x) * inv_dir.x;
    let t3 = (min.y - origin.y) * inv_dir.y;
    let t4 = (max.y - origin.y) * inv_dir.y;
    let t5 = (min.z - origin.z) * inv_dir.z;
    let t6 = (max.z - origin.z) * inv_dir.z;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    // Whole box is behind the origin
    if tmax < 0.0 {
        return None;
    }

    if tmin > tmax {
        return None;
    }

    Some(tmin)
}

impl AbsDiffEq for Bounds {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.center.abs_diff_eq(&other.center, epsilon) && self.size.abs_diff_eq(&other.size, epsilon)
    }
}

impl RelativeEq for Bounds {
    fn default_max_relative() -> f32 {
        f32::EPSILON
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.center.relative_eq(&other.center, epsilon, max_relative)
            && self.size.relative_eq(&other.size, epsilon, max_relative)
    }
}
