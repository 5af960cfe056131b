//! Volume geometry: world <-> voxel mapping and mip level addressing
//!
//! The grid is a cube of `resolution` cells per side anchored at the minimum
//! corner of the scene bounds. Its edge length is the longest edge of the
//! bounds, so shorter axes leave empty space at their far end.
//!
//! All levels share one linear storage. Level `L` has side
//! `resolution >> L` and starts at `level_offset(L)`; inside a level a cell
//! `(x, y, z)` lives at `x + y * side + z * side * side`.

use glam::{Mat4, UVec3, Vec3};

use crate::core::{Error, Result};
use crate::math::Aabb;

/// Largest accepted grid side. Keeps the level offsets and the allocation bounded.
pub const MAX_RESOLUTION: u32 = 1024;

/// `resolution` is a power of two in `2..=MAX_RESOLUTION`
pub fn check_resolution(resolution: u32) -> Result<()> {
    if resolution < 2 || resolution > MAX_RESOLUTION || !resolution.is_power_of_two() {
        return Err(Error::InvalidResolution(resolution));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeLayout {
    bounds: Aabb,
    origin: Vec3,
    voxel_width: f32,
    resolution: u32,
    level_offsets: Vec<usize>,
}

impl VolumeLayout {
    /// Create a layout covering `bounds` with `resolution` cells per side.
    ///
    /// `resolution` must be a power of two in `2..=MAX_RESOLUTION`. `bounds`
    /// must be finite with a positive extent on at least one axis.
    pub fn new(bounds: Aabb, resolution: u32) -> Result<Self> {
        check_resolution(resolution)?;
        if !bounds.is_valid() {
            return Err(Error::InvalidBounds(format!("{:?}", bounds)));
        }
        let extent = bounds.max_extent();
        if extent <= 0.0 {
            return Err(Error::InvalidBounds(format!("zero extent {:?}", bounds)));
        }

        let level_count = resolution.trailing_zeros() + 1;
        let mut level_offsets = Vec::with_capacity(level_count as usize + 1);
        let mut offset = 0usize;
        for level in 0..level_count {
            level_offsets.push(offset);
            let side = (resolution >> level) as usize;
            offset += side * side * side;
        }
        level_offsets.push(offset);

        Ok(Self {
            bounds,
            origin: bounds.min,
            voxel_width: extent / resolution as f32,
            resolution,
            level_offsets,
        })
    }

    /// Bounds the layout was created from
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// World-space cube actually covered by the grid
    pub fn cube(&self) -> Aabb {
        Aabb::new(self.origin, self.origin + Vec3::splat(self.extent()))
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Cells per side at level 0
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Edge length of the whole grid
    pub fn extent(&self) -> f32 {
        self.voxel_width * self.resolution as f32
    }

    /// Edge length of one level 0 cell
    pub fn voxel_width(&self) -> f32 {
        self.voxel_width
    }

    pub fn voxel_width_at(&self, level: u32) -> f32 {
        self.voxel_width * (1u32 << level) as f32
    }

    /// `log2(resolution) + 1`; the last level is a single cell
    pub fn mip_level_count(&self) -> u32 {
        (self.level_offsets.len() - 1) as u32
    }

    pub fn level_resolution(&self, level: u32) -> u32 {
        self.resolution >> level
    }

    /// Number of cells in `level`
    pub fn level_len(&self, level: u32) -> usize {
        let l = level as usize;
        self.level_offsets[l + 1] - self.level_offsets[l]
    }

    /// Start of `level` in the shared storage
    pub fn level_offset(&self, level: u32) -> usize {
        self.level_offsets[level as usize]
    }

    /// Cells across all levels
    pub fn total_len(&self) -> usize {
        self.level_offsets[self.level_offsets.len() - 1]
    }

    /// Index of `cell` inside its level
    #[inline]
    pub fn linear_index(&self, level: u32, cell: UVec3) -> usize {
        let side = self.level_resolution(level) as usize;
        cell.x as usize + side * (cell.y as usize + side * cell.z as usize)
    }

    /// Inverse of [`linear_index`](Self::linear_index)
    #[inline]
    pub fn cell_at(&self, level: u32, index: usize) -> UVec3 {
        let side = self.level_resolution(level) as usize;
        UVec3::new(
            (index % side) as u32,
            ((index / side) % side) as u32,
            (index / (side * side)) as u32,
        )
    }

    /// Position in continuous voxel units (level 0 cells), not clamped
    pub fn world_to_voxel_continuous(&self, p: Vec3) -> Vec3 {
        (p - self.origin) / self.voxel_width
    }

    /// Level 0 cell containing `p`, or `None` outside the cube.
    ///
    /// Points on the far faces of the cube belong to the last cell.
    pub fn world_to_voxel(&self, p: Vec3) -> Option<UVec3> {
        let v = self.world_to_voxel_continuous(p);
        let n = self.resolution as f32;
        if !v.is_finite() || v.min_element() < 0.0 || v.max_element() > n {
            return None;
        }
        Some(v.floor().as_uvec3().min(UVec3::splat(self.resolution - 1)))
    }

    /// World-space center of a level 0 cell
    pub fn voxel_center(&self, cell: UVec3) -> Vec3 {
        self.voxel_center_at(0, cell)
    }

    /// World-space center of a cell at `level`
    pub fn voxel_center_at(&self, level: u32, cell: UVec3) -> Vec3 {
        let width = self.voxel_width_at(level);
        self.origin + (cell.as_vec3() + Vec3::splat(0.5)) * width
    }

    /// Maps world space to continuous voxel space
    pub fn world_to_voxel_matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(1.0 / self.voxel_width))
            * Mat4::from_translation(-self.origin)
    }

    pub fn voxel_to_world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.origin) * Mat4::from_scale(Vec3::splat(self.voxel_width))
    }
}
