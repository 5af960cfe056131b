//! Volume as a mipmapped 3D texture

use crate::core::error::Error;
use crate::voxel::{VolumeLayout, VoxelVolume};

/// `Rgba8Unorm` 3D texture with one mip per volume level
pub struct GpuVolume {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    resolution: u32,
    mip_level_count: u32,
}

impl GpuVolume {
    pub fn new(device: &wgpu::Device, layout: &VolumeLayout) -> Result<Self, Error> {
        let resolution = layout.resolution();
        let max = device.limits().max_texture_dimension_3d;
        if resolution > max {
            return Err(Error::Gpu(format!(
                "volume resolution {} exceeds max 3D texture size {}",
                resolution, max
            )));
        }

        let mip_level_count = layout.mip_level_count();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("voxel_volume"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: resolution,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Linear within a level; callers pick the level explicitly
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("voxel_volume_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            resolution,
            mip_level_count,
        })
    }

    /// Write every level of `volume`; its layout must match the one this
    /// texture was created with
    pub fn upload(&self, queue: &wgpu::Queue, volume: &VoxelVolume) -> Result<(), Error> {
        let layout = volume.layout();
        if layout.resolution() != self.resolution {
            return Err(Error::Gpu(format!(
                "volume is {}^3 but texture is {}^3",
                layout.resolution(),
                self.resolution
            )));
        }

        for level in 0..self.mip_level_count {
            let side = layout.level_resolution(level);
            let texels = volume.level(level).to_rgba8();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &texels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(side * 4),
                    rows_per_image: Some(side),
                },
                wgpu::Extent3d {
                    width: side,
                    height: side,
                    depth_or_array_layers: side,
                },
            );
        }
        Ok(())
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }
}
