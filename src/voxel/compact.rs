//! Stream compaction of occupied voxels into draw instances

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use super::append::{AppendBuffer, DrawIndirectArgs};
use super::volume::VoxelVolume;

/// One voxel cube to draw - 32 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VoxelInstance {
    /// World-space center
    pub position: [f32; 3],
    /// Edge length
    pub size: f32,
    /// Packed voxel value
    pub color: u32,
    pub level: u32,
    pub _pad: [u32; 2],
}

pub type InstanceBuffer = AppendBuffer<VoxelInstance>;

/// Append one instance per occupied cell of `level` to `instances`.
///
/// Slot order is whatever order the workers claim them in. The returned
/// draw covers everything in the buffer, including instances that were
/// already there.
pub fn compact(volume: &VoxelVolume, level: u32, instances: &InstanceBuffer) -> DrawIndirectArgs {
    let layout = volume.layout();
    let view = volume.level(level);
    let size = view.voxel_width();

    view.cells()
        .par_iter()
        .enumerate()
        .with_min_len(1024)
        .for_each(|(index, cell)| {
            let bits = cell.load(std::sync::atomic::Ordering::Relaxed);
            if bits == 0 {
                return;
            }
            let center = layout.voxel_center_at(level, layout.cell_at(level, index));
            instances.push(VoxelInstance {
                position: center.to_array(),
                size,
                color: bits,
                level,
                _pad: [0; 2],
            });
        });

    let dropped = instances.dropped();
    if dropped > 0 {
        log::warn!(
            "Instance buffer full: {} of {} voxels at level {} not drawn",
            dropped,
            dropped + instances.len(),
            level
        );
    }

    DrawIndirectArgs::cubes(instances.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use crate::voxel::layout::VolumeLayout;
    use glam::{UVec3, Vec3};
    use std::collections::HashSet;

    fn volume(resolution: u32) -> VoxelVolume {
        let layout = VolumeLayout::new(Aabb::new(Vec3::ZERO, Vec3::splat(8.0)), resolution).unwrap();
        VoxelVolume::new(layout)
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<VoxelInstance>(), 32);
    }

    #[test]
    fn test_block_of_27() {
        let v = volume(8);
        for z in 2..5 {
            for y in 2..5 {
                for x in 2..5 {
                    v.merge(UVec3::new(x, y, z), [x as u8, y as u8, z as u8]);
                }
            }
        }
        let instances = InstanceBuffer::new(512);
        let args = compact(&v, 0, &instances);
        assert_eq!(args.instance_count, 27);
        assert_eq!(args.vertex_count, 36);

        let cells: HashSet<[u32; 3]> = instances
            .iter()
            .map(|inst| {
                assert_eq!(inst.size, 1.0);
                let p = inst.position;
                [p[0] as u32, p[1] as u32, p[2] as u32]
            })
            .collect();
        assert_eq!(cells.len(), 27);
        for inst in instances.iter() {
            let p = inst.position;
            let cell = UVec3::new(p[0] as u32, p[1] as u32, p[2] as u32);
            assert_eq!(inst.color, v.load(0, cell).to_bits());
        }
    }

    #[test]
    fn test_empty_volume() {
        let v = volume(8);
        let instances = InstanceBuffer::new(16);
        assert_eq!(compact(&v, 0, &instances).instance_count, 0);
    }

    #[test]
    fn test_truncates_at_capacity() {
        let v = volume(8);
        for x in 0..8 {
            v.merge(UVec3::new(x, 0, 0), [1, 1, 1]);
        }
        let instances = InstanceBuffer::new(5);
        let args = compact(&v, 0, &instances);
        assert_eq!(args.instance_count, 5);
        assert_eq!(instances.dropped(), 3);
    }

    #[test]
    fn test_mip_level_instances() {
        let v = volume(8);
        v.store(2, UVec3::new(1, 0, 1), crate::voxel::Voxel::new(5, 5, 5, 32));
        let instances = InstanceBuffer::new(16);
        compact(&v, 2, &instances);
        let inst = instances.get(0).unwrap();
        assert_eq!(inst.size, 4.0);
        assert_eq!(inst.level, 2);
        assert_eq!(inst.position, [6.0, 2.0, 6.0]);
    }
}
