//! Per-triangle pass: rasterize small triangles, queue large ones
//!
//! One work item per triangle. A triangle whose conservative cell box holds
//! fewer than `threshold` cells is tested cell by cell right away; anything
//! bigger would stall its worker, so it goes to the large queue for the
//! indirect pass.

use rayon::prelude::*;

use crate::scene::SceneView;
use crate::voxel::VoxelVolume;

use super::queue::LargeTriangleQueue;
use super::raster::{cell_overlaps, write_cell, CellRange, RasterStats};
use super::triangles::{TriangleRef, TriangleTable, VoxelTriangle};

/// Classify every triangle of `table` and rasterize the small ones
pub fn rasterize_small(
    scene: &SceneView<'_>,
    table: &TriangleTable,
    volume: &VoxelVolume,
    queue: &LargeTriangleQueue,
    threshold: u32,
    group_size: u32,
) -> RasterStats {
    (0..table.len())
        .into_par_iter()
        .with_min_len(group_size.max(1) as usize)
        .map(|index| {
            let mut stats = RasterStats { triangles: 1, ..Default::default() };
            let resolved = table
                .get(index)
                .and_then(|tri_ref| Some((tri_ref, table.resolve(scene, tri_ref)?)));
            let Some((tri_ref, tri)) = resolved else {
                stats.skipped = 1;
                return stats;
            };
            classify(scene, volume, queue, threshold, tri_ref, &tri, &mut stats);
            stats
        })
        .reduce(RasterStats::default, |a, b| a + b)
}

fn classify(
    scene: &SceneView<'_>,
    volume: &VoxelVolume,
    queue: &LargeTriangleQueue,
    threshold: u32,
    tri_ref: TriangleRef,
    tri: &VoxelTriangle,
    stats: &mut RasterStats,
) {
    let range = match CellRange::of_triangle(&tri.triangle, volume.resolution()) {
        Some(range) if !tri.triangle.is_degenerate() => range,
        _ => {
            stats.skipped = 1;
            return;
        }
    };

    if range.footprint() >= threshold as u64 {
        if queue.push(tri_ref) {
            stats.queued = 1;
        } else {
            stats.dropped = 1;
        }
        return;
    }

    stats.small = 1;
    for cell in range.iter() {
        if cell_overlaps(&tri.triangle, cell) {
            write_cell(volume, scene.registry, tri, cell);
            stats.fragments += 1;
        }
    }
}
