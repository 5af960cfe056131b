//! Per-cycle reset of the volume and the append counters

use crate::voxel::{InstanceBuffer, VoxelVolume};

use super::queue::LargeTriangleQueue;

/// Zero the volume (every level) and the counters, the two halves in
/// parallel. Returns once both are done.
pub fn reset_cycle(
    volume: &mut VoxelVolume,
    queue: &mut LargeTriangleQueue,
    instances: &mut InstanceBuffer,
) {
    rayon::join(
        || volume.clear_all(),
        || {
            queue.reset();
            instances.reset();
        },
    );
}
