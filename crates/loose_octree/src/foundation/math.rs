//! Math utilities and types
//!
//! Provides the plain vector arithmetic the spatial index is built on.

pub use nalgebra::Vector3;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Math utility functions
pub mod utils {
    use super::Vec3;

    /// Vector with every component set to `value`
    pub fn splat(value: f32) -> Vec3 {
        Vec3::new(value, value, value)
    }

    /// Per-axis sign of `direction`, treating zero as positive
    ///
    /// Every component of the result is either `1.0` or `-1.0`.
    pub fn axis_signs(direction: &Vec3) -> Vec3 {
        direction.map(|v| if v >= 0.0 { 1.0 } else { -1.0 })
    }

    /// Check that every component is neither NaN nor infinite
    pub fn is_finite(v: &Vec3) -> bool {
        v.iter().all(|c| c.is_finite())
    }
}
