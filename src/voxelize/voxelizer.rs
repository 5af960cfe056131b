//! Voxelizer: owns every per-cycle resource and runs the stages
//!
//! Storage is allocated once in [`Voxelizer::new`] for the worst case and
//! reused every cycle. Each stage takes `&mut self` and returns only after
//! its workers have joined, so a stage never observes the previous one half
//! done. Changing the resolution goes through [`Voxelizer::rebuild`].

use std::time::Instant;

use serde::Serialize;

use crate::core::Result;
use crate::math::Aabb;
use crate::scene::SceneView;
use crate::voxel::{
    compact, DrawIndirectArgs, InstanceBuffer, MipAggregator, VolumeLayout, VoxelVolume,
};

use super::config::VoxelizerConfig;
use super::queue::LargeTriangleQueue;
use super::raster::RasterStats;
use super::reset::reset_cycle;
use super::strategy::{create_strategy, StrategyKind, VoxelizationStrategy, VoxelizeTarget};
use super::triangles::TriangleTable;

/// Summary of the most recent cycle
#[derive(Clone, Debug, Default, Serialize)]
pub struct CycleStats {
    pub cycle: u64,
    pub strategy: StrategyKind,
    pub resolution: u32,
    pub raster: RasterStats,
    /// Groups launched for the large queue
    pub large_dispatch_groups: u32,
    pub occupied_voxels: u64,
    pub instances: u32,
    pub dropped_instances: u32,
    pub reset_ms: f64,
    pub voxelize_ms: f64,
    pub mip_ms: f64,
    pub compact_ms: f64,
}

pub struct Voxelizer {
    config: VoxelizerConfig,
    layout: VolumeLayout,
    volume: VoxelVolume,
    mips: MipAggregator,
    triangles: TriangleTable,
    queue: LargeTriangleQueue,
    instances: InstanceBuffer,
    strategy: Box<dyn VoxelizationStrategy>,
    draw_args: DrawIndirectArgs,
    stats: CycleStats,
    cycles: u64,
}

impl Voxelizer {
    /// Validate `config` and allocate everything for `bounds`
    pub fn new(config: VoxelizerConfig, bounds: Aabb) -> Result<Self> {
        config.validate()?;
        let layout = VolumeLayout::new(bounds, config.resolution)?;
        let volume = VoxelVolume::new(layout.clone());
        let mips = MipAggregator::new(&layout, config.mip_group_level);
        let queue = LargeTriangleQueue::new(config.large_queue_capacity, config.dispatch_group_size);
        let instances = InstanceBuffer::new(config.instance_capacity());

        log::info!(
            "Voxelizer: {}^3 grid, {} mip levels, voxel width {:.4}, {:.1} MB volume, {} strategy",
            layout.resolution(),
            layout.mip_level_count(),
            layout.voxel_width(),
            volume.memory_size() as f64 / (1024.0 * 1024.0),
            config.strategy
        );

        Ok(Self {
            strategy: create_strategy(config.strategy),
            config,
            layout,
            volume,
            mips,
            triangles: TriangleTable::new(),
            queue,
            instances,
            draw_args: DrawIndirectArgs::default(),
            stats: CycleStats::default(),
            cycles: 0,
        })
    }

    /// Clear the volume and every per-cycle counter
    pub fn reset(&mut self) {
        let start = Instant::now();
        reset_cycle(&mut self.volume, &mut self.queue, &mut self.instances);
        self.draw_args = DrawIndirectArgs::default();
        self.stats.reset_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::debug!("Reset: {:.2}ms", self.stats.reset_ms);
    }

    /// Rasterize `scene` into the base level.
    ///
    /// Expects a reset volume; merging into a volume that was not reset
    /// accumulates on top of the previous cycle.
    pub fn voxelize(&mut self, scene: &SceneView<'_>) -> CycleStats {
        let start = Instant::now();
        self.cycles += 1;
        self.triangles.rebuild(scene, &self.layout);

        let mut target = VoxelizeTarget {
            volume: &self.volume,
            triangles: &self.triangles,
            queue: &self.queue,
            config: &self.config,
            stats: RasterStats::default(),
        };
        self.strategy.begin(&mut target);
        self.strategy.rasterize(&mut target, scene);
        self.strategy.end(&mut target, scene);
        let raster = target.stats;

        self.stats.cycle = self.cycles;
        self.stats.strategy = self.strategy.kind();
        self.stats.resolution = self.layout.resolution();
        self.stats.raster = raster;
        self.stats.large_dispatch_groups = self.queue.dispatch_args().x;
        self.stats.occupied_voxels = self.volume.occupied_count(0) as u64;
        self.stats.voxelize_ms = start.elapsed().as_secs_f64() * 1000.0;

        log::debug!(
            "Voxelize: {} triangles ({} small, {} large, {} projected, {} skipped, {} dropped) -> {} voxels in {:.2}ms",
            raster.triangles,
            raster.small,
            raster.large,
            raster.projected,
            raster.skipped,
            raster.dropped,
            self.stats.occupied_voxels,
            self.stats.voxelize_ms
        );
        self.stats.clone()
    }

    /// Rebuild mip levels from the base level
    pub fn build_mips(&mut self) {
        let start = Instant::now();
        self.mips.build(&self.volume);
        self.stats.mip_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::debug!("Mips: {} levels in {:.2}ms", self.layout.mip_level_count(), self.stats.mip_ms);
    }

    /// Collect the occupied voxels of `level` (clamped to the top level)
    /// into the instance buffer
    pub fn compact(&mut self, level: u32) -> DrawIndirectArgs {
        let start = Instant::now();
        let level = level.min(self.layout.mip_level_count() - 1);
        self.instances.reset();
        self.draw_args = compact(&self.volume, level, &self.instances);
        self.stats.instances = self.draw_args.instance_count;
        self.stats.dropped_instances = self.instances.dropped();
        self.stats.compact_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::debug!(
            "Compact level {}: {} instances in {:.2}ms",
            level,
            self.draw_args.instance_count,
            self.stats.compact_ms
        );
        self.draw_args
    }

    /// Reset, voxelize, build mips and compact level 0
    pub fn run_cycle(&mut self, scene: &SceneView<'_>) -> CycleStats {
        self.reset();
        self.voxelize(scene);
        self.build_mips();
        self.compact(0);
        let stats = &self.stats;
        log::info!(
            "Cycle {}: {} triangles -> {} voxels, {} instances ({:.1}ms voxelize, {:.1}ms mips)",
            stats.cycle,
            stats.raster.triangles,
            stats.occupied_voxels,
            stats.instances,
            stats.voxelize_ms,
            stats.mip_ms
        );
        self.stats.clone()
    }

    /// Reallocate for a new resolution over the same bounds
    pub fn rebuild(&mut self, resolution: u32) -> Result<()> {
        let config = self.config.clone().with_resolution(resolution);
        let mut rebuilt = Self::new(config, self.layout.bounds())?;
        rebuilt.cycles = self.cycles;
        *self = rebuilt;
        Ok(())
    }

    pub fn set_strategy(&mut self, kind: StrategyKind) {
        if self.strategy.kind() != kind {
            log::info!("Voxelization strategy: {} -> {}", self.strategy.kind(), kind);
            self.strategy = create_strategy(kind);
        }
        self.config.strategy = kind;
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn config(&self) -> &VoxelizerConfig {
        &self.config
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    pub fn queue(&self) -> &LargeTriangleQueue {
        &self.queue
    }

    pub fn instances(&self) -> &InstanceBuffer {
        &self.instances
    }

    pub fn draw_args(&self) -> DrawIndirectArgs {
        self.draw_args
    }

    pub fn last_stats(&self) -> &CycleStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::scene::{Material, Mesh, MeshInstance, SceneRegistry, Texture};
    use crate::voxelize::test_scenes::*;
    use glam::{Mat4, UVec3, Vec2, Vec3};
    use std::collections::HashSet;

    fn voxelizer(resolution: u32, strategy: StrategyKind, bounds: Aabb) -> Voxelizer {
        let config = VoxelizerConfig::default()
            .with_resolution(resolution)
            .with_strategy(strategy);
        Voxelizer::new(config, bounds).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let config = VoxelizerConfig::default().with_resolution(100);
        assert!(matches!(
            Voxelizer::new(config, unit_bounds(16)),
            Err(Error::InvalidResolution(100))
        ));
        assert!(matches!(
            Voxelizer::new(VoxelizerConfig::default(), Aabb::EMPTY),
            Err(Error::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_coverage_matches_brute_force() {
        let scene = mixed_scene();
        for strategy in [StrategyKind::Compute, StrategyKind::Projected] {
            let mut v = voxelizer(16, strategy, scene.bounds);
            let stats = v.run_cycle(&scene.view());
            if strategy == StrategyKind::Compute {
                assert!(stats.raster.small > 0);
                assert!(stats.raster.large > 0);
                assert_eq!(stats.raster.queued, stats.raster.large);
            } else {
                assert_eq!(stats.raster.large, 0);
                assert!(stats.raster.projected > 0);
            }
            let expected = brute_force(&scene, v.volume());
            assert_eq!(occupied(v.volume()), expected, "{} strategy", strategy);
            assert_eq!(stats.occupied_voxels, expected.len() as u64);
        }
    }

    #[test]
    fn test_strategy_equivalence() {
        let scene = mixed_scene();
        let mut compute = voxelizer(16, StrategyKind::Compute, scene.bounds);
        let mut projected = voxelizer(16, StrategyKind::Projected, scene.bounds);
        compute.run_cycle(&scene.view());
        projected.run_cycle(&scene.view());

        assert_eq!(occupied(compute.volume()), occupied(projected.volume()));
        // Flat single color, so colors agree exactly too
        assert_eq!(
            compute.volume().level(0).to_rgba8(),
            projected.volume().level(0).to_rgba8()
        );
        for level in 1..compute.layout().mip_level_count() {
            assert_eq!(
                compute.volume().occupied_count(level),
                projected.volume().occupied_count(level)
            );
        }
    }

    #[test]
    fn test_order_independence() {
        let (mut registry, red) = registry([255, 0, 0, 255]);
        let blue = registry.add_material(Material::solid("blue", [0, 0, 255, 255])).unwrap();
        let green = registry.add_material(Material::solid("green", [0, 255, 0, 255])).unwrap();
        let mut instances = Vec::new();
        for (i, mat) in [red, blue, green].into_iter().enumerate() {
            let mesh = registry.add_mesh(Mesh::cuboid(Vec3::splat(3.0), mat)).unwrap();
            instances.push(MeshInstance::at(mesh, Vec3::splat(7.0 + i as f32 * 0.7)));
        }
        let bounds = unit_bounds(16);

        let mut forward = voxelizer(16, StrategyKind::Compute, bounds);
        forward.run_cycle(&SceneView::new(&registry, &instances));
        let reversed_instances: Vec<_> = instances.iter().rev().copied().collect();
        let mut reversed = voxelizer(16, StrategyKind::Compute, bounds);
        reversed.run_cycle(&SceneView::new(&registry, &reversed_instances));

        assert_eq!(occupied(forward.volume()), occupied(reversed.volume()));
        let a = forward.volume().level(0);
        let b = reversed.volume().level(0);
        for i in 0..a.len() {
            let (va, vb) = (a.get_linear(i), b.get_linear(i));
            assert_eq!(va.coverage, vb.coverage);
            for (ca, cb) in va.rgb().iter().zip(vb.rgb()) {
                assert!((*ca as i32 - cb as i32).abs() <= 4, "cell {}: {:?} vs {:?}", i, va, vb);
            }
        }

        // Same input twice, different scheduling
        let before = occupied(forward.volume());
        forward.run_cycle(&SceneView::new(&registry, &instances));
        assert_eq!(occupied(forward.volume()), before);
    }

    #[test]
    fn test_threshold_boundary() {
        // Thin triangles spanning exactly 31, 32 and 33 cells in a row
        for (cells, path_small) in [(31u32, true), (32, false), (33, false)] {
            let end = cells as f32 - 0.2;
            let scene = triangles_scene(
                &[[
                    Vec3::new(0.2, 0.2, 0.5),
                    Vec3::new(end, 0.2, 0.5),
                    Vec3::new(0.2, 0.8, 0.5),
                ]],
                64,
            );
            let mut v = voxelizer(64, StrategyKind::Compute, scene.bounds);
            let stats = v.run_cycle(&scene.view());

            assert_eq!(stats.raster.triangles, 1);
            assert_eq!(stats.raster.small, path_small as u64, "{} cells", cells);
            assert_eq!(stats.raster.queued, !path_small as u64, "{} cells", cells);
            assert_eq!(stats.raster.large, !path_small as u64, "{} cells", cells);
            assert_eq!(stats.occupied_voxels, cells as u64);
            assert_eq!(stats.raster.fragments, cells as u64);
            let expected: HashSet<[u32; 3]> = (0..cells).map(|x| [x, 0, 0]).collect();
            assert_eq!(occupied(v.volume()).into_iter().collect::<HashSet<_>>(), expected);
        }
    }

    #[test]
    fn test_skips_degenerate_and_outside() {
        let scene = triangles_scene(
            &[
                [Vec3::splat(2.0), Vec3::splat(3.0), Vec3::splat(4.0)],
                [Vec3::splat(-9.0), Vec3::new(-5.0, -9.0, -9.0), Vec3::new(-9.0, -5.0, -9.0)],
                [Vec3::new(1.5, 1.5, 1.5), Vec3::new(1.7, 1.5, 1.5), Vec3::new(1.5, 1.7, 1.5)],
            ],
            8,
        );
        let mut v = voxelizer(8, StrategyKind::Compute, scene.bounds);
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.raster.skipped, 2);
        assert_eq!(stats.raster.small, 1);
        assert_eq!(stats.occupied_voxels, 1);
        assert!(v.volume().is_occupied(0, UVec3::ONE));
    }

    #[test]
    fn test_single_voxel_mip_chain() {
        let scene = triangles_scene(
            &[[Vec3::new(5.2, 6.2, 7.5), Vec3::new(5.8, 6.2, 7.5), Vec3::new(5.2, 6.8, 7.5)]],
            16,
        );
        let mut v = voxelizer(16, StrategyKind::Compute, scene.bounds);
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.occupied_voxels, 1);
        let cell = UVec3::new(5, 6, 7);
        for level in 0..v.layout().mip_level_count() {
            assert_eq!(v.volume().occupied_count(level), 1);
            assert!(v.volume().is_occupied(level, cell >> level));
        }
    }

    #[test]
    fn test_empty_scene_empty_pyramid() {
        let registry = SceneRegistry::new();
        let mut v = voxelizer(16, StrategyKind::Compute, unit_bounds(16));
        let stats = v.run_cycle(&SceneView::new(&registry, &[]));
        assert_eq!(stats.raster.triangles, 0);
        assert!(v.volume().occupancy().iter().all(|&n| n == 0));
        assert_eq!(v.draw_args().instance_count, 0);
    }

    #[test]
    fn test_compaction_exact() {
        let scene = mixed_scene();
        let mut v = voxelizer(16, StrategyKind::Compute, scene.bounds);
        let stats = v.run_cycle(&scene.view());
        let args = v.draw_args();
        assert_eq!(args.vertex_count, 36);
        assert_eq!(args.instance_count as u64, stats.occupied_voxels);
        assert_eq!(stats.dropped_instances, 0);

        let layout = v.layout().clone();
        let cells: HashSet<[u32; 3]> = v
            .instances()
            .iter()
            .map(|inst| {
                layout
                    .world_to_voxel(Vec3::from_array(inst.position))
                    .unwrap()
                    .to_array()
            })
            .collect();
        assert_eq!(cells.len(), args.instance_count as usize);
        assert_eq!(cells, occupied(v.volume()).into_iter().collect::<HashSet<_>>());

        // A coarser level
        let top = v.compact(1);
        assert_eq!(top.instance_count as usize, v.volume().occupied_count(1));
        assert!(v.instances().iter().all(|inst| inst.size == 2.0 && inst.level == 1));
    }

    #[test]
    fn test_counter_isolation() {
        let scene = mixed_scene();
        let mut v = voxelizer(16, StrategyKind::Compute, scene.bounds);
        let first = v.run_cycle(&scene.view());
        let second = v.run_cycle(&scene.view());
        assert_eq!(second.cycle, first.cycle + 1);
        assert_eq!(first.raster, second.raster);
        assert_eq!(first.instances, second.instances);
        assert_eq!(v.queue().len() as u64, second.raster.queued);

        // A scene with no large triangles leaves the queue empty
        let small = triangles_scene(
            &[[Vec3::new(1.2, 1.2, 1.5), Vec3::new(2.6, 1.2, 1.5), Vec3::new(1.2, 2.6, 1.5)]],
            16,
        );
        let stats = v.run_cycle(&small.view());
        assert!(v.queue().is_empty());
        assert_eq!(stats.large_dispatch_groups, 0);
        assert_eq!(stats.occupied_voxels, 3);
        assert_eq!(v.draw_args().instance_count, 3);
    }

    #[test]
    fn test_queue_saturation() {
        let big: Vec<[Vec3; 3]> = (0..5)
            .map(|i| {
                let z = 1.5 + i as f32 * 2.0;
                [Vec3::new(0.5, 0.5, z), Vec3::new(14.5, 0.5, z), Vec3::new(0.5, 14.5, z)]
            })
            .collect();
        let scene = triangles_scene(&big, 16);
        let config = VoxelizerConfig {
            resolution: 16,
            large_queue_capacity: 2,
            dispatch_group_size: 1,
            ..Default::default()
        };
        let mut v = Voxelizer::new(config, scene.bounds).unwrap();
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.raster.queued, 2);
        assert_eq!(stats.raster.dropped, 3);
        assert_eq!(stats.raster.large, 2);
        assert_eq!(stats.large_dispatch_groups, 2);
        assert!(v.queue().len() <= v.queue().capacity());
        assert_eq!(v.queue().dropped(), 3);
    }

    #[test]
    fn test_instance_truncation() {
        let scene = mixed_scene();
        let config = VoxelizerConfig {
            resolution: 16,
            max_instances: Some(10),
            ..Default::default()
        };
        let mut v = Voxelizer::new(config, scene.bounds).unwrap();
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.instances, 10);
        assert_eq!(stats.dropped_instances as u64, stats.occupied_voxels - 10);
    }

    #[test]
    fn test_rebuild() {
        let scene = mixed_scene();
        let mut v = voxelizer(16, StrategyKind::Projected, scene.bounds);
        v.run_cycle(&scene.view());
        let coarse = v.volume().memory_size();

        v.rebuild(32).unwrap();
        assert_eq!(v.layout().resolution(), 32);
        assert_eq!(v.layout().mip_level_count(), 6);
        assert_eq!(v.config().resolution, 32);
        assert_eq!(v.strategy(), StrategyKind::Projected);
        assert!(v.volume().memory_size() > coarse);
        assert_eq!(v.volume().occupied_count(0), 0);
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.resolution, 32);
        assert!(stats.occupied_voxels > 0);

        assert!(matches!(v.rebuild(48), Err(Error::InvalidResolution(48))));
        assert_eq!(v.layout().resolution(), 32);
    }

    #[test]
    fn test_set_strategy() {
        let scene = mixed_scene();
        let mut v = voxelizer(16, StrategyKind::Compute, scene.bounds);
        v.set_strategy(StrategyKind::Projected);
        assert_eq!(v.strategy(), StrategyKind::Projected);
        assert_eq!(v.config().strategy, StrategyKind::Projected);
        let stats = v.run_cycle(&scene.view());
        assert_eq!(stats.strategy, StrategyKind::Projected);
        assert_eq!(stats.raster.queued, 0);
        assert!(v.queue().is_empty());
    }

    #[test]
    fn test_textured_albedo() {
        let mut registry = SceneRegistry::new();
        let tex = registry.add_texture(Texture::checker(2, [255, 255, 255, 255], [0, 0, 0, 255]));
        let mat = registry
            .add_material(Material::textured("checker", [255, 0, 0, 255], tex))
            .unwrap();
        // Quad in the z = 0.5 plane with UVs stretched over 8x8 cells
        let quad = Mesh::new(
            "quad",
            vec![
                Vec3::new(0.0, 0.0, 0.5),
                Vec3::new(8.0, 0.0, 0.5),
                Vec3::new(8.0, 8.0, 0.5),
                Vec3::new(0.0, 8.0, 0.5),
            ],
            vec![0, 1, 2, 0, 2, 3],
            mat,
        )
        .with_uvs(vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y]);
        let mesh = registry.add_mesh(quad).unwrap();
        let instances = [MeshInstance::new(mesh, Mat4::IDENTITY)];

        let mut v = voxelizer(8, StrategyKind::Compute, unit_bounds(8));
        v.run_cycle(&SceneView::new(&registry, &instances));
        assert_eq!(v.volume().load(0, UVec3::new(1, 1, 0)).rgb(), [255, 0, 0]);
        assert_eq!(v.volume().load(0, UVec3::new(6, 1, 0)).rgb(), [0, 0, 0]);
        assert!(!v.volume().load(0, UVec3::new(6, 1, 0)).is_empty());
    }
}
