//! Packed voxel value
//!
//! Every cell of the volume is one `u32`: RGB in the low three bytes and a
//! coverage byte on top. A value of zero is an empty cell.
//!
//! Coverage has two meanings depending on the level. In the base grid it
//! counts how many fragments were merged into the cell (saturating at 255)
//! and the color is their running average. In mip levels it is the fraction
//! of occupied children scaled to 255, rounded up so any occupied child
//! keeps the parent non-zero.

use bytemuck::{Pod, Zeroable};

/// Single voxel - exactly 4 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Voxel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Fragment count (base level) or occupied-child fraction (mip levels)
    pub coverage: u8,
}

impl Voxel {
    /// Empty voxel
    pub const EMPTY: Voxel = Voxel { r: 0, g: 0, b: 0, coverage: 0 };

    /// Create a voxel from color and coverage
    pub fn new(r: u8, g: u8, b: u8, coverage: u8) -> Self {
        Self { r, g, b, coverage }
    }

    /// Unpack from the storage representation
    pub fn from_bits(bits: u32) -> Self {
        let [r, g, b, coverage] = bits.to_le_bytes();
        Self { r, g, b, coverage }
    }

    /// Pack into the storage representation
    pub fn to_bits(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.coverage])
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Check if voxel is empty
    pub fn is_empty(&self) -> bool {
        self.coverage == 0
    }

    /// Fold one more fragment of `color` into a base-level voxel.
    ///
    /// The color becomes the rounded running average over all merged
    /// fragments. Once coverage saturates the count stops growing but the
    /// average keeps absorbing new fragments with weight 1/256.
    pub fn merged(self, color: [u8; 3]) -> Voxel {
        let n = self.coverage as u32;
        let avg = |old: u8, new: u8| -> u8 {
            ((old as u32 * n + new as u32 + (n + 1) / 2) / (n + 1)) as u8
        };
        Voxel {
            r: avg(self.r, color[0]),
            g: avg(self.g, color[1]),
            b: avg(self.b, color[2]),
            coverage: self.coverage.saturating_add(1),
        }
    }

    /// Aggregate a 2x2x2 block of children into their parent.
    ///
    /// Color is the unweighted average of the occupied children; coverage is
    /// `ceil(occupied * 255 / 8)`.
    pub fn aggregate(children: &[Voxel; 8]) -> Voxel {
        let mut occupied = 0u32;
        let mut sum = [0u32; 3];
        for child in children.iter().filter(|c| !c.is_empty()) {
            occupied += 1;
            sum[0] += child.r as u32;
            sum[1] += child.g as u32;
            sum[2] += child.b as u32;
        }
        if occupied == 0 {
            return Voxel::EMPTY;
        }
        let avg = |s: u32| ((s + occupied / 2) / occupied) as u8;
        Voxel {
            r: avg(sum[0]),
            g: avg(sum[1]),
            b: avg(sum[2]),
            coverage: ((occupied * 255).div_ceil(8)) as u8,
        }
    }

    /// RGBA8 texel; `base_level` voxels are fully opaque when occupied,
    /// mip voxels carry their coverage as alpha.
    pub fn to_rgba8(&self, base_level: bool) -> [u8; 4] {
        let alpha = match (self.is_empty(), base_level) {
            (true, _) => 0,
            (false, true) => 255,
            (false, false) => self.coverage,
        };
        [self.r, self.g, self.b, alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<Voxel>(), 4);
    }

    #[test]
    fn test_bits_layout() {
        let v = Voxel::new(0x11, 0x22, 0x33, 0x44);
        assert_eq!(v.to_bits(), 0x4433_2211);
        assert_eq!(Voxel::from_bits(0x4433_2211), v);
        assert_eq!(Voxel::EMPTY.to_bits(), 0);
    }

    #[test]
    fn test_empty() {
        assert!(Voxel::EMPTY.is_empty());
        // Black geometry still occupies its cell
        let black = Voxel::EMPTY.merged([0, 0, 0]);
        assert!(!black.is_empty());
        assert_ne!(black.to_bits(), 0);
    }

    #[test]
    fn test_merge_running_average() {
        let v = Voxel::EMPTY.merged([200, 0, 100]).merged([100, 50, 100]);
        assert_eq!(v.coverage, 2);
        assert_eq!(v.rgb(), [150, 25, 100]);
    }

    #[test]
    fn test_merge_saturates_coverage() {
        let mut v = Voxel::EMPTY;
        for _ in 0..300 {
            v = v.merged([10, 20, 30]);
        }
        assert_eq!(v.coverage, 255);
        assert_eq!(v.rgb(), [10, 20, 30]);
    }

    #[test]
    fn test_aggregate() {
        let mut children = [Voxel::EMPTY; 8];
        assert!(Voxel::aggregate(&children).is_empty());

        children[3] = Voxel::new(100, 0, 0, 1);
        let single = Voxel::aggregate(&children);
        assert_eq!(single.rgb(), [100, 0, 0]);
        assert_eq!(single.coverage, 32);

        children[5] = Voxel::new(0, 100, 0, 9);
        let two = Voxel::aggregate(&children);
        assert_eq!(two.rgb(), [50, 50, 0]);
        assert_eq!(two.coverage, 64);

        let full = Voxel::aggregate(&[Voxel::new(8, 8, 8, 1); 8]);
        assert_eq!(full.coverage, 255);
    }
}
