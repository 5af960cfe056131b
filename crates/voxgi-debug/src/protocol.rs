//! Debug protocol - JSON command/response definitions

use serde::{Deserialize, Serialize};

/// Commands sent by a debug client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum DebugCommand {
    /// Ping (health check)
    Ping,
    /// Grid size, mip levels, bounds and strategy
    GetVolumeInfo,
    /// Counters and timings of the last cycle
    GetCycleStats,
    /// Read one voxel
    GetVoxel { x: u32, y: u32, z: u32, level: u32 },
    /// Occupied voxel count for every mip level
    GetMipOccupancy,
    /// Cut through a level as a base64 PNG; `axis` is "x", "y" or "z"
    ExportSlice { level: u32, axis: String, index: u32 },
    /// Run a full cycle on the current scene
    Revoxelize,
    /// Reallocate at a new resolution and re-run a cycle
    SetResolution { resolution: u32 },
    /// Switch method ("compute" or "projected") and re-run a cycle
    SetStrategy { strategy: String },
    /// Rebuild the instance list from another level
    Compact { level: u32 },
}

/// Responses from debug server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DebugResponse {
    #[serde(rename = "ok")]
    Ok { data: ResponseData },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    None,
    Pong { message: String },
    VolumeInfo {
        resolution: u32,
        mip_levels: u32,
        voxel_width: f32,
        origin: [f32; 3],
        extent: f32,
        strategy: String,
        memory_bytes: u64,
        instance_capacity: u32,
        large_queue_capacity: u32,
    },
    CycleStats(CycleStatsInfo),
    Voxel {
        x: u32,
        y: u32,
        z: u32,
        level: u32,
        occupied: bool,
        color: [u8; 3],
        coverage: u8,
        raw: u32,
    },
    MipOccupancy { levels: Vec<LevelOccupancy> },
    Slice {
        level: u32,
        axis: String,
        index: u32,
        width: u32,
        height: u32,
        png_base64: String,
    },
    Compacted {
        level: u32,
        instance_count: u32,
        vertex_count: u32,
        dropped: u32,
    },
    ParamsUpdated { description: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStatsInfo {
    pub cycle: u64,
    pub strategy: String,
    pub resolution: u32,
    pub triangles: u64,
    pub skipped: u64,
    pub small: u64,
    pub queued: u64,
    pub dropped: u64,
    pub large: u64,
    pub projected: u64,
    pub fragments: u64,
    pub large_dispatch_groups: u32,
    pub occupied_voxels: u64,
    pub instances: u32,
    pub dropped_instances: u32,
    pub reset_ms: f64,
    pub voxelize_ms: f64,
    pub mip_ms: f64,
    pub compact_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelOccupancy {
    pub level: u32,
    pub resolution: u32,
    pub occupied: u64,
}

impl DebugResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self::Ok { data }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error {
            message: msg.into(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(ResponseData::Pong {
            message: "pong".into(),
        })
    }

    pub fn none() -> Self {
        Self::ok(ResponseData::None)
    }
}
