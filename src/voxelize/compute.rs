//! Two-pass voxelization: per-triangle pass plus indirect large pass

use std::time::Instant;

use crate::scene::SceneView;

use super::large::dispatch_indirect;
use super::small::rasterize_small;
use super::strategy::{StrategyKind, VoxelizationStrategy, VoxelizeTarget};

#[derive(Debug, Default)]
pub struct ComputeVoxelizer {
    started: Option<Instant>,
}

impl ComputeVoxelizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoxelizationStrategy for ComputeVoxelizer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Compute
    }

    fn begin(&mut self, _target: &mut VoxelizeTarget<'_>) {
        self.started = Some(Instant::now());
    }

    fn rasterize(&mut self, target: &mut VoxelizeTarget<'_>, scene: &SceneView<'_>) {
        target.stats += rasterize_small(
            scene,
            target.triangles,
            target.volume,
            target.queue,
            target.config.large_triangle_threshold,
            target.config.dispatch_group_size,
        );
    }

    fn end(&mut self, target: &mut VoxelizeTarget<'_>, scene: &SceneView<'_>) {
        let args = target.queue.publish();
        let small_done = self.started.map(|s| s.elapsed());
        target.stats += dispatch_indirect(args, scene, target.triangles, target.volume, target.queue);

        if let Some(start) = self.started.take() {
            log::debug!(
                "Compute voxelization: small pass {:.2}ms, {} large triangles in {} groups, total {:.2}ms",
                small_done.map_or(0.0, |d| d.as_secs_f64() * 1000.0),
                target.queue.len(),
                args.x,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}
