//! Voxel storage, mip pyramid and compaction

pub mod voxel;
pub mod layout;
pub mod volume;
pub mod append;
pub mod mip;
pub mod compact;

pub use voxel::Voxel;
pub use layout::{check_resolution, VolumeLayout, MAX_RESOLUTION};
pub use volume::{MipView, SliceAxis, SliceImage, VoxelVolume};
pub use append::{AppendBuffer, DispatchIndirectArgs, DrawIndirectArgs, CUBE_VERTEX_COUNT};
pub use mip::MipAggregator;
pub use compact::{compact, InstanceBuffer, VoxelInstance};
