//! Voxelizer configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::check_resolution;

use super::strategy::StrategyKind;

/// Instance buffer size used when `max_instances` is not set and the grid
/// is larger than this
pub const DEFAULT_INSTANCE_CAP: u32 = 4 * 1024 * 1024;

/// Tunables for a [`Voxelizer`](super::Voxelizer).
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Cells per side of the base grid (power of two, >= 2)
    pub resolution: u32,
    /// Triangles touching at least this many cells go to the large queue
    pub large_triangle_threshold: u32,
    /// Work items per dispatch group
    pub dispatch_group_size: u32,
    /// Large triangles held per cycle; the rest are dropped
    pub large_queue_capacity: u32,
    /// Visualization instances; defaults to `min(resolution^3, 4M)`
    pub max_instances: Option<u32>,
    /// Mip level each aggregation task builds before the counter handoff
    pub mip_group_level: u32,
    pub strategy: StrategyKind,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            resolution: 128,
            large_triangle_threshold: 32,
            dispatch_group_size: 32,
            large_queue_capacity: 64 * 1024,
            max_instances: None,
            mip_group_level: 3,
            strategy: StrategyKind::Compute,
        }
    }
}

impl VoxelizerConfig {
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_resolution(self.resolution)?;
        let positive = [
            ("large_triangle_threshold", self.large_triangle_threshold),
            ("dispatch_group_size", self.dispatch_group_size),
            ("large_queue_capacity", self.large_queue_capacity),
            ("mip_group_level", self.mip_group_level),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        if self.max_instances == Some(0) {
            return Err(Error::InvalidConfig("max_instances must be > 0".into()));
        }
        Ok(())
    }

    /// Capacity of the visualization instance buffer
    pub fn instance_capacity(&self) -> u32 {
        self.max_instances.unwrap_or_else(|| {
            let cells = (self.resolution as u64).pow(3);
            cells.min(DEFAULT_INSTANCE_CAP as u64) as u32
        })
    }
}
