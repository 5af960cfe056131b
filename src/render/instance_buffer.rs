//! Instance list and indirect draw arguments on the GPU

use crate::voxel::{DrawIndirectArgs, InstanceBuffer, VoxelInstance};

pub struct GpuInstances {
    instance_buffer: wgpu::Buffer,
    indirect_buffer: wgpu::Buffer,
    capacity: u32,
}

impl GpuInstances {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let instance_size = std::mem::size_of::<VoxelInstance>() as u64;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel_instances"),
            size: capacity.max(1) as u64 * instance_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let indirect_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel_draw_indirect"),
            size: std::mem::size_of::<DrawIndirectArgs>() as u64,
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            instance_buffer,
            indirect_buffer,
            capacity,
        }
    }

    /// Copy the compacted instances and their draw call. Instances past the
    /// GPU buffer's capacity are cut off and the draw count clamped to match.
    pub fn upload(&self, queue: &wgpu::Queue, instances: &InstanceBuffer, draw_args: DrawIndirectArgs) {
        let count = draw_args.instance_count.min(self.capacity).min(instances.len());
        if count < draw_args.instance_count {
            log::warn!(
                "GPU instance buffer holds {} of {} instances",
                count,
                draw_args.instance_count
            );
        }

        let instance_size = std::mem::size_of::<VoxelInstance>();
        let bytes = instances.to_bytes();
        let used = &bytes[..count as usize * instance_size];
        if !used.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, used);
        }

        let args = DrawIndirectArgs {
            instance_count: count,
            ..draw_args
        };
        queue.write_buffer(&self.indirect_buffer, 0, bytemuck::bytes_of(&args));
    }

    pub fn instance_buffer(&self) -> &wgpu::Buffer {
        &self.instance_buffer
    }

    pub fn indirect_buffer(&self) -> &wgpu::Buffer {
        &self.indirect_buffer
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
