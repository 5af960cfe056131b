//! Debug protocol handler for a running voxelizer
//!
//! Owns the voxelizer together with the scene it voxelizes so that commands
//! which re-run a cycle have everything they need.

use glam::UVec3;
use voxgi_debug::{
    encode_png_base64, CycleStatsInfo, DebugCommand, DebugHandler, DebugResponse, LevelOccupancy,
    ResponseData,
};

use crate::scene::{MeshInstance, SceneRegistry, SceneView};
use crate::voxel::SliceAxis;
use crate::voxelize::{CycleStats, StrategyKind, Voxelizer};

pub struct VoxelizerDebugHandler {
    voxelizer: Voxelizer,
    registry: SceneRegistry,
    instances: Vec<MeshInstance>,
}

impl VoxelizerDebugHandler {
    pub fn new(voxelizer: Voxelizer, registry: SceneRegistry, instances: Vec<MeshInstance>) -> Self {
        Self { voxelizer, registry, instances }
    }

    pub fn voxelizer(&self) -> &Voxelizer {
        &self.voxelizer
    }

    fn run_cycle(&mut self) -> CycleStats {
        let scene = SceneView::new(&self.registry, &self.instances);
        self.voxelizer.run_cycle(&scene)
    }

    fn volume_info(&self) -> ResponseData {
        let layout = self.voxelizer.layout();
        let config = self.voxelizer.config();
        ResponseData::VolumeInfo {
            resolution: layout.resolution(),
            mip_levels: layout.mip_level_count(),
            voxel_width: layout.voxel_width(),
            origin: layout.origin().to_array(),
            extent: layout.extent(),
            strategy: self.voxelizer.strategy().to_string(),
            memory_bytes: self.voxelizer.volume().memory_size() as u64,
            instance_capacity: self.voxelizer.instances().capacity(),
            large_queue_capacity: config.large_queue_capacity,
        }
    }

    fn voxel(&self, x: u32, y: u32, z: u32, level: u32) -> DebugResponse {
        let layout = self.voxelizer.layout();
        if level >= layout.mip_level_count() {
            return DebugResponse::error(format!(
                "level {} out of range (volume has {} levels)",
                level,
                layout.mip_level_count()
            ));
        }
        let view = self.voxelizer.volume().level(level);
        match view.try_get(UVec3::new(x, y, z)) {
            Some(voxel) => DebugResponse::ok(ResponseData::Voxel {
                x,
                y,
                z,
                level,
                occupied: !voxel.is_empty(),
                color: voxel.rgb(),
                coverage: voxel.coverage,
                raw: voxel.to_bits(),
            }),
            None => DebugResponse::error(format!(
                "cell ({}, {}, {}) outside level {} ({}^3)",
                x,
                y,
                z,
                level,
                view.resolution()
            )),
        }
    }

    fn slice(&self, level: u32, axis: &str, index: u32) -> DebugResponse {
        let axis_kind: SliceAxis = match axis.parse() {
            Ok(a) => a,
            Err(e) => return DebugResponse::error(e),
        };
        if level >= self.voxelizer.layout().mip_level_count() {
            return DebugResponse::error(format!("level {} out of range", level));
        }
        let view = self.voxelizer.volume().level(level);
        let Some(image) = view.slice_rgba8(axis_kind, index) else {
            return DebugResponse::error(format!(
                "slice index {} outside level {} ({}^3)",
                index,
                level,
                view.resolution()
            ));
        };
        match encode_png_base64(image.width, image.height, &image.pixels) {
            Ok(png_base64) => DebugResponse::ok(ResponseData::Slice {
                level,
                axis: axis.to_ascii_lowercase(),
                index,
                width: image.width,
                height: image.height,
                png_base64,
            }),
            Err(e) => DebugResponse::error(e.to_string()),
        }
    }
}

impl From<&CycleStats> for CycleStatsInfo {
    fn from(stats: &CycleStats) -> Self {
        let raster = &stats.raster;
        Self {
            cycle: stats.cycle,
            strategy: stats.strategy.to_string(),
            resolution: stats.resolution,
            triangles: raster.triangles,
            skipped: raster.skipped,
            small: raster.small,
            queued: raster.queued,
            dropped: raster.dropped,
            large: raster.large,
            projected: raster.projected,
            fragments: raster.fragments,
            large_dispatch_groups: stats.large_dispatch_groups,
            occupied_voxels: stats.occupied_voxels,
            instances: stats.instances,
            dropped_instances: stats.dropped_instances,
            reset_ms: stats.reset_ms,
            voxelize_ms: stats.voxelize_ms,
            mip_ms: stats.mip_ms,
            compact_ms: stats.compact_ms,
        }
    }
}

impl DebugHandler for VoxelizerDebugHandler {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
        match cmd {
            DebugCommand::Ping => DebugResponse::pong(),

            DebugCommand::GetVolumeInfo => DebugResponse::ok(self.volume_info()),

            DebugCommand::GetCycleStats => {
                DebugResponse::ok(ResponseData::CycleStats(self.voxelizer.last_stats().into()))
            }

            DebugCommand::GetVoxel { x, y, z, level } => self.voxel(x, y, z, level),

            DebugCommand::GetMipOccupancy => {
                let layout = self.voxelizer.layout();
                let levels = self
                    .voxelizer
                    .volume()
                    .occupancy()
                    .into_iter()
                    .enumerate()
                    .map(|(level, occupied)| LevelOccupancy {
                        level: level as u32,
                        resolution: layout.level_resolution(level as u32),
                        occupied: occupied as u64,
                    })
                    .collect();
                DebugResponse::ok(ResponseData::MipOccupancy { levels })
            }

            DebugCommand::ExportSlice { level, axis, index } => self.slice(level, &axis, index),

            DebugCommand::Revoxelize => {
                let stats = self.run_cycle();
                DebugResponse::ok(ResponseData::CycleStats((&stats).into()))
            }

            DebugCommand::SetResolution { resolution } => {
                if let Err(e) = self.voxelizer.rebuild(resolution) {
                    return DebugResponse::error(e.to_string());
                }
                let stats = self.run_cycle();
                DebugResponse::ok(ResponseData::ParamsUpdated {
                    description: format!(
                        "resolution {}^3, {} voxels occupied",
                        resolution, stats.occupied_voxels
                    ),
                })
            }

            DebugCommand::SetStrategy { strategy } => {
                let kind: StrategyKind = match strategy.parse() {
                    Ok(k) => k,
                    Err(e) => return DebugResponse::error(e),
                };
                self.voxelizer.set_strategy(kind);
                let stats = self.run_cycle();
                DebugResponse::ok(ResponseData::ParamsUpdated {
                    description: format!("strategy {}, {} voxels occupied", kind, stats.occupied_voxels),
                })
            }

            DebugCommand::Compact { level } => {
                let args = self.voxelizer.compact(level);
                DebugResponse::ok(ResponseData::Compacted {
                    level: level.min(self.voxelizer.layout().mip_level_count() - 1),
                    instance_count: args.instance_count,
                    vertex_count: args.vertex_count,
                    dropped: self.voxelizer.instances().dropped(),
                })
            }
        }
    }
}
