//! voxgi - Parallel triangle-mesh voxelization for voxel global illumination
//!
//! A [`Voxelizer`] turns a [`SceneView`] into a dense RGBA voxel grid, builds
//! its mip pyramid and compacts occupied voxels into instances ready for an
//! indirect draw.

pub mod core;
pub mod math;
pub mod voxel;
pub mod scene;
pub mod voxelize;
pub mod render;
pub mod debug;

pub use crate::core::{Error, Result};
pub use debug::VoxelizerDebugHandler;
pub use scene::{SceneRegistry, SceneView};
pub use voxelize::{StrategyKind, Voxelizer, VoxelizerConfig};
