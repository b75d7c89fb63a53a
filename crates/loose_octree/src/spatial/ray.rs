//! Ray primitive for ray casts and proximity queries

use crate::foundation::math::Vec3;

/// A ray for ray casting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray
    ///
    /// Hit distances are measured in multiples of this vector, so they are
    /// world-space distances only when it is unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    ///
    /// The direction is normalized; a zero direction is kept as is.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(f32::EPSILON).unwrap_or(direction),
        }
    }

    /// Creates a ray without touching the direction
    pub fn from_raw(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Copy of this ray with a unit-length direction
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self::new(self.origin, self.direction)
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Squared perpendicular distance from `point` to the line through this ray
    ///
    /// Computed as `|direction x (point - origin)|^2`, which is only the true
    /// distance when the direction is unit length.
    pub fn sqr_distance_to_point(&self, point: &Vec3) -> f32 {
        self.direction.cross(&(point - self.origin)).norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_normalizes_direction() {
        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 3.0, 4.0));
        assert_relative_eq!(ray.direction.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(ray.direction, Vec3::new(0.0, 0.6, 0.8), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_direction_survives() {
        let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::zeros());
        assert_eq!(ray.direction, Vec3::zeros());
    }

    #[test]
    fn test_point_at() {
        let ray = Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(ray.point_at(5.0), Vec3::new(1.0, 0.0, 5.0), epsilon = 1e-6);
    }

    #[test]
    fn test_perpendicular_distance() {
        let ray = Ray::new(Vec3::zeros(), Vec3::x());
        assert_relative_eq!(ray.sqr_distance_to_point(&Vec3::new(10.0, 3.0, 4.0)), 25.0, epsilon = 1e-4);
        // Points behind the origin still measure against the infinite line
        assert_relative_eq!(ray.sqr_distance_to_point(&Vec3::new(-10.0, 0.0, 2.0)), 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_raw_ray_scales_distance() {
        let ray = Ray::from_raw(Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(ray.sqr_distance_to_point(&Vec3::new(0.0, 1.0, 0.0)), 4.0, epsilon = 1e-6);
        assert_relative_eq!(ray.normalized().sqr_distance_to_point(&Vec3::new(0.0, 1.0, 0.0)), 1.0, epsilon = 1e-6);
    }
}
