//! Indirect pass over the large-triangle queue
//!
//! Large triangles are walked along their dominant axis. The triangle is
//! projected onto the plane of the other two axes and the projected cell
//! rectangle is scanned column by column. Plane depth is stepped
//! incrementally across the row, so each column only visits the few cells
//! the plane passes through instead of the whole bounding box. Every
//! candidate is confirmed with the same exact test the small path uses,
//! which keeps both paths writing identical cell sets.

use glam::{UVec3, Vec2, Vec3};
use rayon::prelude::*;

use crate::math::{triangle_overlaps_square, Triangle};
use crate::scene::SceneView;
use crate::voxel::{DispatchIndirectArgs, VoxelVolume};

use super::queue::LargeTriangleQueue;
use super::raster::{cell_overlaps, write_cell, CellRange, RasterStats};
use super::triangles::TriangleTable;

/// Slack added to column and depth bounds against rounding in the stepping
const WALK_EPSILON: f32 = 1e-3;

/// Run `args.x` groups over the queue, each taking `group_size` entries
pub fn dispatch_indirect(
    args: DispatchIndirectArgs,
    scene: &SceneView<'_>,
    table: &TriangleTable,
    volume: &VoxelVolume,
    queue: &LargeTriangleQueue,
) -> RasterStats {
    let group_size = queue.group_size();
    let count = queue.len();

    (0..args.group_count())
        .into_par_iter()
        .map(|group| {
            let start = group.saturating_mul(group_size).min(count);
            let end = start.saturating_add(group_size).min(count);
            let mut stats = RasterStats::default();
            for slot in start..end {
                let Some(tri) = queue.get(slot).and_then(|r| table.resolve(scene, r)) else {
                    continue;
                };
                let Some(range) = CellRange::of_triangle(&tri.triangle, volume.resolution()) else {
                    continue;
                };
                stats.large += 1;
                for_each_plane_cell(&tri.triangle, &range, |cell| {
                    write_cell(volume, scene.registry, &tri, cell);
                    stats.fragments += 1;
                });
            }
            stats
        })
        .reduce(RasterStats::default, |a, b| a + b)
}

/// Visit every cell of `range` that `tri` overlaps, walking the triangle's
/// plane along its dominant axis. `tri` must not be degenerate.
pub fn for_each_plane_cell(tri: &Triangle, range: &CellRange, mut visit: impl FnMut(UVec3)) {
    let normal = tri.scaled_normal();
    let d = tri.dominant_axis();
    let (u, v) = ((d + 1) % 3, (d + 2) % 3);
    if normal[d] == 0.0 {
        return;
    }

    let project = |p: Vec3| Vec2::new(p[u], p[v]);
    let flat = [project(tri.a), project(tri.b), project(tri.c)];

    // depth(pu, pv) = offset + du * pu + dv * pv on the plane. Stepping is
    // done in f64 so long rows do not drift.
    let nd = normal[d] as f64;
    let du = -normal[u] as f64 / nd;
    let dv = -normal[v] as f64 / nd;
    let offset = normal.as_dvec3().dot(tri.a.as_dvec3()) / nd;

    let eps = WALK_EPSILON as f64;
    let bounds = tri.aabb();
    let (tri_min_d, tri_max_d) = (bounds.min[d] as f64, bounds.max[d] as f64);
    let (cell_min_d, cell_max_d) = (range.min[d], range.max[d]);

    for cv in range.min[v]..=range.max[v] {
        let pv = cv as f64;
        let mut depth = offset + du * range.min[u] as f64 + dv * pv;
        for cu in range.min[u]..=range.max[u] {
            // Depth at the column's low corner, then step to the next column
            let corner = depth;
            depth += du;

            let center = Vec2::new(cu as f32 + 0.5, cv as f32 + 0.5);
            if !triangle_overlaps_square(&flat, center, 0.5 + WALK_EPSILON) {
                continue;
            }

            let corners = [corner, corner + du, corner + dv, corner + du + dv];
            let lo = corners.iter().copied().fold(f64::INFINITY, f64::min).max(tri_min_d) - eps;
            let hi = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max).min(tri_max_d) + eps;
            if hi < lo {
                continue;
            }

            let first = (lo.ceil() - 1.0).max(cell_min_d as f64) as u32;
            let last = hi.floor().clamp(0.0, cell_max_d as f64) as u32;
            for cd in first..=last {
                let mut cell = UVec3::ZERO;
                cell[d] = cd;
                cell[u] = cu;
                cell[v] = cv;
                if cell_overlaps(tri, cell) {
                    visit(cell);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Brute force over the whole cell range
    fn reference(tri: &Triangle, range: &CellRange) -> BTreeSet<[u32; 3]> {
        range
            .iter()
            .filter(|&c| cell_overlaps(tri, c))
            .map(|c| c.to_array())
            .collect()
    }

    fn walked(tri: &Triangle, range: &CellRange) -> BTreeSet<[u32; 3]> {
        let mut cells = BTreeSet::new();
        let mut visits = 0;
        for_each_plane_cell(tri, range, |c| {
            cells.insert(c.to_array());
            visits += 1;
        });
        assert_eq!(visits, cells.len(), "a cell was visited twice");
        cells
    }

    fn check(tri: Triangle, resolution: u32) {
        let range = CellRange::of_triangle(&tri, resolution).unwrap();
        let expected = reference(&tri, &range);
        assert!(!expected.is_empty());
        assert_eq!(walked(&tri, &range), expected, "{:?}", tri);
    }

    #[test]
    fn test_axis_aligned_plane() {
        check(
            Triangle::new(Vec3::new(1.3, 2.0, 5.5), Vec3::new(20.7, 3.1, 5.5), Vec3::new(4.0, 18.2, 5.5)),
            32,
        );
    }

    #[test]
    fn test_plane_on_cell_boundary() {
        check(
            Triangle::new(Vec3::new(1.0, 1.0, 4.0), Vec3::new(9.0, 1.0, 4.0), Vec3::new(1.0, 9.0, 4.0)),
            16,
        );
    }

    #[test]
    fn test_slanted_planes() {
        let tris = [
            Triangle::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(30.0, 12.0, 9.0), Vec3::new(3.0, 28.0, 20.0)),
            Triangle::new(Vec3::new(2.2, 30.1, 1.7), Vec3::new(17.9, 0.3, 25.3), Vec3::new(29.4, 22.6, 3.3)),
            Triangle::new(Vec3::new(5.0, 1.0, 1.0), Vec3::new(6.0, 29.0, 3.0), Vec3::new(7.5, 4.0, 30.0)),
            // 45 degree plane, ties between axes
            Triangle::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(20.0, 20.0, 0.0), Vec3::new(0.0, 0.0, 20.0)),
        ];
        for tri in tris {
            check(tri, 32);
        }
    }

    #[test]
    fn test_clipped_by_grid() {
        check(
            Triangle::new(Vec3::new(-8.0, -3.0, 2.5), Vec3::new(40.0, 6.0, 12.0), Vec3::new(10.0, 50.0, 7.0)),
            16,
        );
    }
}
