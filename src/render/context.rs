//! Headless GPU context using wgpu

use crate::core::error::Error;

/// GPU device without a surface, enough to upload and sample the volume
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Create a context on the best available adapter
    pub async fn headless() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let adapter_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voxgi_device"),
                required_features: wgpu::Features::INDIRECT_FIRST_INSTANCE & adapter.features(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_3d: adapter_limits.max_texture_dimension_3d,
                    max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                    max_buffer_size: adapter_limits.max_buffer_size,
                    ..Default::default()
                },
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let info = adapter.get_info();
        log::info!(
            "GPU: {} ({:?}), max 3D texture {}, max buffer {}MB",
            info.name,
            info.backend,
            adapter_limits.max_texture_dimension_3d,
            adapter_limits.max_buffer_size / 1024 / 1024
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking wrapper around [`headless`](Self::headless)
    pub fn headless_blocking() -> Result<Self, Error> {
        pollster::block_on(Self::headless())
    }

    /// Whether a grid of `resolution` cells per side fits in a 3D texture
    pub fn supports_resolution(&self, resolution: u32) -> bool {
        resolution <= self.device.limits().max_texture_dimension_3d
    }
}
