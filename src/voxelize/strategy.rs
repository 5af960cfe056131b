//! Interchangeable voxelization methods

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scene::SceneView;
use crate::voxel::VoxelVolume;

use super::config::VoxelizerConfig;
use super::queue::LargeTriangleQueue;
use super::raster::RasterStats;
use super::triangles::TriangleTable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Small/large split with an indirect pass for the large queue
    #[default]
    Compute,
    /// Every triangle walked along its dominant-axis projection
    Projected,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Compute => "compute",
            StrategyKind::Projected => "projected",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compute" => Ok(StrategyKind::Compute),
            "projected" => Ok(StrategyKind::Projected),
            other => Err(format!("unknown strategy '{}' (expected compute or projected)", other)),
        }
    }
}

/// Resources a strategy writes into during one voxelization stage.
///
/// The volume has been cleared and the triangle table rebuilt before
/// `begin` is called.
pub struct VoxelizeTarget<'a> {
    pub volume: &'a VoxelVolume,
    pub triangles: &'a TriangleTable,
    pub queue: &'a LargeTriangleQueue,
    pub config: &'a VoxelizerConfig,
    /// Accumulated by the strategy
    pub stats: RasterStats,
}

/// A way of turning the scene's triangles into voxels.
///
/// The voxelizer calls `begin`, `rasterize` and `end` in that order once per
/// cycle. When `end` returns every write to the volume must be done.
pub trait VoxelizationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn begin(&mut self, target: &mut VoxelizeTarget<'_>);

    fn rasterize(&mut self, target: &mut VoxelizeTarget<'_>, scene: &SceneView<'_>);

    /// Finish deferred work; `scene` is the one passed to `rasterize`
    fn end(&mut self, target: &mut VoxelizeTarget<'_>, scene: &SceneView<'_>);
}

/// Construct the strategy for `kind`
pub fn create_strategy(kind: StrategyKind) -> Box<dyn VoxelizationStrategy> {
    match kind {
        StrategyKind::Compute => Box::new(super::compute::ComputeVoxelizer::new()),
        StrategyKind::Projected => Box::new(super::projected::ProjectedVoxelizer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Compute".parse::<StrategyKind>(), Ok(StrategyKind::Compute));
        assert_eq!("projected".parse::<StrategyKind>(), Ok(StrategyKind::Projected));
        assert!("conservative".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::Projected.to_string(), "projected");
        assert_eq!(create_strategy(StrategyKind::Projected).kind(), StrategyKind::Projected);
        assert_eq!(
            serde_json::to_string(&StrategyKind::Compute).unwrap(),
            "\"compute\""
        );
    }
}
