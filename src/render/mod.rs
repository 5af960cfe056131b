//! GPU hand-off of the voxelizer's outputs

pub mod context;
pub mod volume_texture;
pub mod instance_buffer;

pub use context::GpuContext;
pub use volume_texture::GpuVolume;
pub use instance_buffer::GpuInstances;
