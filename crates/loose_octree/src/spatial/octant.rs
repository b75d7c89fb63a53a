//! Child octant indexing
//!
//! Octant layout (bit 1 = +X, bit 4 = -Y, bit 2 = +Z):
//! 0: -X, +Y, -Z
//! 1: +X, +Y, -Z
//! 2: -X, +Y, +Z
//! 3: +X, +Y, +Z
//! 4: -X, -Y, -Z
//! 5: +X, -Y, -Z
//! 6: -X, -Y, +Z
//! 7: +X, -Y, +Z

use bitflags::bitflags;

use crate::foundation::math::Vec3;

/// Index of one of the 8 children of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Octant(u8);

impl Octant {
    /// Number of children of a branch node
    pub const COUNT: usize = 8;

    /// Create an octant from an index
    ///
    /// # Panics
    ///
    /// Panics if `index` is not in `0..8`; an out-of-range octant means the
    /// tree is corrupted.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(index: usize) -> Self {
        assert!(index < Self::COUNT, "octant index must be 0-7, got {index}");
        Self(index as u8)
    }

    /// All octants in index order
    pub fn all() -> impl Iterator<Item = Octant> {
        (0..Self::COUNT).map(Self::new)
    }

    /// Index into a node's child array
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The child a point belongs to relative to a node center
    ///
    /// Ties resolve to the low bit on every axis: `x <= center.x` is -X,
    /// `y >= center.y` is +Y and `z <= center.z` is -Z, so a point exactly on
    /// a dividing plane picks one side deterministically.
    pub fn best_fit(node_center: &Vec3, point: &Vec3) -> Self {
        let x = u8::from(point.x > node_center.x);
        let y = u8::from(point.y < node_center.y);
        let z = u8::from(point.z > node_center.z);
        Self(x + y * 4 + z * 2)
    }

    /// Sign pattern of this octant, each component `1.0` or `-1.0`
    pub fn signs(self) -> Vec3 {
        let x = if self.0 & 1 != 0 { 1.0 } else { -1.0 };
        let y = if self.0 & 4 != 0 { -1.0 } else { 1.0 };
        let z = if self.0 & 2 != 0 { 1.0 } else { -1.0 };
        Vec3::new(x, y, z)
    }

    /// Offset from a parent center to this child's center
    pub fn offset(self, quarter: f32) -> Vec3 {
        self.signs() * quarter
    }

    /// Single-bit mask for this octant
    pub fn mask(self) -> ChildMask {
        ChildMask::from_bits_retain(1 << self.0)
    }
}

bitflags! {
    /// Which children of a node hold at least one entry in their subtree
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChildMask: u8 {
        /// -X, +Y, -Z
        const OCTANT_0 = 1 << 0;
        /// +X, +Y, -Z
        const OCTANT_1 = 1 << 1;
        /// -X, +Y, +Z
        const OCTANT_2 = 1 << 2;
        /// +X, +Y, +Z
        const OCTANT_3 = 1 << 3;
        /// -X, -Y, -Z
        const OCTANT_4 = 1 << 4;
        /// +X, -Y, -Z
        const OCTANT_5 = 1 << 5;
        /// -X, -Y, +Z
        const OCTANT_6 = 1 << 6;
        /// +X, -Y, +Z
        const OCTANT_7 = 1 << 7;
    }
}

impl Default for ChildMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl ChildMask {
    /// Check whether the child at `octant` is occupied
    pub fn has(self, octant: Octant) -> bool {
        self.contains(octant.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_fit_matches_offsets() {
        let center = Vec3::new(10.0, -4.0, 2.0);
        for octant in Octant::all() {
            let child_center = center + octant.offset(1.0);
            assert_eq!(Octant::best_fit(&center, &child_center), octant);
        }
    }

    #[test]
    fn test_best_fit_ties_pick_low_bits() {
        let center = Vec3::zeros();
        // On every plane: -X, +Y, -Z
        assert_eq!(Octant::best_fit(&center, &center).index(), 0);
        assert_eq!(Octant::best_fit(&center, &Vec3::new(0.0, -1.0, 0.0)).index(), 4);
        assert_eq!(Octant::best_fit(&center, &Vec3::new(1.0, 0.0, 1.0)).index(), 3);
    }

    #[test]
    fn test_index_layout() {
        assert_eq!(Octant::new(0).signs(), Vec3::new(-1.0, 1.0, -1.0));
        assert_eq!(Octant::new(3).signs(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(Octant::new(4).signs(), Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(Octant::new(7).signs(), Vec3::new(1.0, -1.0, 1.0));
    }

    #[test]
    #[should_panic(expected = "octant index must be 0-7")]
    fn test_out_of_range_octant_panics() {
        let _ = Octant::new(8);
    }

    #[test]
    fn test_masks() {
        let mut mask = ChildMask::empty();
        mask.insert(Octant::new(2).mask());
        mask.insert(Octant::new(7).mask());
        assert!(mask.has(Octant::new(2)));
        assert!(!mask.has(Octant::new(3)));
        assert_eq!(mask.bits(), 0b1000_0100);
        assert_eq!(Octant::all().map(Octant::mask).fold(ChildMask::empty(), |a, b| a | b), ChildMask::all());
    }
}
