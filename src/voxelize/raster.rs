//! Shared rasterization pieces: cell ranges, the overlap test and stats

use std::ops::{Add, AddAssign};

use glam::{UVec3, Vec3};
use serde::Serialize;

use crate::math::Triangle;
use crate::scene::SceneRegistry;
use crate::voxel::VoxelVolume;

use super::triangles::VoxelTriangle;

/// Inclusive box of cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub min: UVec3,
    pub max: UVec3,
}

impl CellRange {
    /// Conservative cell bounds of a voxel-space triangle, clamped to a grid
    /// of `resolution` cells. Cells that only touch the triangle's bounding
    /// box are included. `None` if the triangle misses the grid entirely.
    pub fn of_triangle(tri: &Triangle, resolution: u32) -> Option<Self> {
        // glam min/max drop NaN, so the box alone would look valid
        if !(tri.a.is_finite() && tri.b.is_finite() && tri.c.is_finite()) {
            return None;
        }
        let bounds = tri.aabb();
        if !bounds.is_valid() {
            return None;
        }
        let n = resolution as f32;
        if bounds.max.cmplt(Vec3::ZERO).any() || bounds.min.cmpgt(Vec3::splat(n)).any() {
            return None;
        }
        let min = (bounds.min.ceil() - Vec3::ONE).max(Vec3::ZERO).as_uvec3();
        let max = bounds.max.floor().min(Vec3::splat(n - 1.0)).as_uvec3();
        Some(Self { min, max })
    }

    /// Number of cells in the range
    pub fn footprint(&self) -> u64 {
        let size = (self.max - self.min + UVec3::ONE).as_u64vec3();
        size.x * size.y * size.z
    }

    pub fn contains(&self, cell: UVec3) -> bool {
        cell.cmpge(self.min).all() && cell.cmple(self.max).all()
    }

    pub fn iter(&self) -> impl Iterator<Item = UVec3> + '_ {
        (self.min.z..=self.max.z).flat_map(move |z| {
            (self.min.y..=self.max.y)
                .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| UVec3::new(x, y, z)))
        })
    }
}

/// Exact triangle/cell test in voxel space
#[inline]
pub fn cell_overlaps(tri: &Triangle, cell: UVec3) -> bool {
    tri.overlaps_box(cell.as_vec3() + Vec3::splat(0.5), Vec3::splat(0.5))
}

/// Merge the triangle's color at `cell` into the volume
#[inline]
pub(crate) fn write_cell(volume: &VoxelVolume, registry: &SceneRegistry, tri: &VoxelTriangle, cell: UVec3) {
    let color = tri.color_at(registry, cell.as_vec3() + Vec3::splat(0.5));
    volume.merge(cell, color);
}

/// Per-triangle outcome counters, summed across workers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RasterStats {
    /// Triangles looked at by the first pass
    pub triangles: u64,
    /// Degenerate, unresolvable or outside the grid
    pub skipped: u64,
    /// Rasterized directly by the small-triangle path
    pub small: u64,
    /// Appended to the large queue
    pub queued: u64,
    /// Large triangles lost to a full queue
    pub dropped: u64,
    /// Rasterized from the large queue
    pub large: u64,
    /// Rasterized by the projected walker without a queue
    pub projected: u64,
    /// Cell merges performed
    pub fragments: u64,
}

impl Add for RasterStats {
    type Output = RasterStats;

    fn add(self, o: RasterStats) -> RasterStats {
        RasterStats {
            triangles: self.triangles + o.triangles,
            skipped: self.skipped + o.skipped,
            small: self.small + o.small,
            queued: self.queued + o.queued,
            dropped: self.dropped + o.dropped,
            large: self.large + o.large,
            projected: self.projected + o.projected,
            fragments: self.fragments + o.fragments,
        }
    }
}

impl AddAssign for RasterStats {
    fn add_assign(&mut self, o: RasterStats) {
        *self = *self + o;
    }
}
