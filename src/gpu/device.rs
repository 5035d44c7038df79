use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuDevice {
    pub async fn new(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
    ) -> Result<(Self, wgpu::Adapter), GpuInitError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("shaderlive device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await?;

        // Log errors raised outside an error scope instead of panicking.
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            tracing::error!("uncaptured GPU error: {error}");
        }));

        let info = adapter.get_info();
        tracing::info!("using {} ({:?})", info.name, info.backend);

        Ok((GpuDevice { device, queue }, adapter))
    }

    pub fn new_blocking(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
    ) -> Result<(Self, wgpu::Adapter), GpuInitError> {
        pollster::block_on(Self::new(instance, surface))
    }
}
