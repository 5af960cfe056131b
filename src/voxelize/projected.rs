//! Single-pass voxelization along each triangle's dominant axis
//!
//! No size split and no queue: every triangle goes through the plane
//! walker on the worker that picked it up.

use std::time::Instant;

use rayon::prelude::*;

use crate::scene::SceneView;

use super::large::for_each_plane_cell;
use super::raster::{write_cell, CellRange, RasterStats};
use super::strategy::{StrategyKind, VoxelizationStrategy, VoxelizeTarget};

#[derive(Debug, Default)]
pub struct ProjectedVoxelizer {
    started: Option<Instant>,
}

impl ProjectedVoxelizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoxelizationStrategy for ProjectedVoxelizer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Projected
    }

    fn begin(&mut self, _target: &mut VoxelizeTarget<'_>) {
        self.started = Some(Instant::now());
    }

    fn rasterize(&mut self, target: &mut VoxelizeTarget<'_>, scene: &SceneView<'_>) {
        let table = target.triangles;
        let volume = target.volume;
        let resolution = volume.resolution();

        target.stats += (0..table.len())
            .into_par_iter()
            .with_min_len(target.config.dispatch_group_size.max(1) as usize)
            .map(|index| {
                let mut stats = RasterStats { triangles: 1, ..Default::default() };
                let tri = table.get(index).and_then(|r| table.resolve(scene, r));
                let Some((tri, range)) = tri
                    .filter(|t| !t.triangle.is_degenerate())
                    .and_then(|t| Some((t, CellRange::of_triangle(&t.triangle, resolution)?)))
                else {
                    stats.skipped = 1;
                    return stats;
                };
                stats.projected = 1;
                for_each_plane_cell(&tri.triangle, &range, |cell| {
                    write_cell(volume, scene.registry, &tri, cell);
                    stats.fragments += 1;
                });
                stats
            })
            .reduce(RasterStats::default, |a, b| a + b);
    }

    fn end(&mut self, _target: &mut VoxelizeTarget<'_>, _scene: &SceneView<'_>) {
        if let Some(start) = self.started.take() {
            log::debug!(
                "Projected voxelization: {:.2}ms",
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}
