//! Triangle-mesh voxelization
//!
//! A cycle runs reset, voxelize, mip build and compaction in that order
//! (see [`Voxelizer::run_cycle`]). Voxelization itself is delegated to a
//! [`VoxelizationStrategy`].

pub mod config;
pub mod triangles;
pub mod raster;
pub mod small;
pub mod queue;
pub mod large;
pub mod reset;
pub mod strategy;
pub mod compute;
pub mod projected;
pub mod voxelizer;

#[cfg(test)]
pub(crate) mod test_scenes;

pub use config::VoxelizerConfig;
pub use triangles::{TriangleRef, TriangleTable, VoxelTriangle};
pub use raster::{CellRange, RasterStats};
pub use queue::LargeTriangleQueue;
pub use strategy::{create_strategy, StrategyKind, VoxelizationStrategy, VoxelizeTarget};
pub use compute::ComputeVoxelizer;
pub use projected::ProjectedVoxelizer;
pub use voxelizer::{CycleStats, Voxelizer};
