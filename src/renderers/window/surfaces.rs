// AIDEV-NOTE: Owns the window surface and its configuration across resizes
pub struct SurfaceManager {
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
}

impl SurfaceManager {
    pub fn new(surface: wgpu::Surface<'static>, adapter: wgpu::Adapter) -> Self {
        Self { surface, adapter }
    }

    /// Zero-sized surfaces (minimised windows) are left unconfigured.
    pub fn configure(&self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let surface_config = self.create_surface_config(width, height);
        self.surface.configure(device, &surface_config);
    }

    /// Prefers a linear format so shader output reaches the screen unconverted.
    pub fn get_optimal_format(&self) -> wgpu::TextureFormat {
        let surface_caps = self.surface.get_capabilities(&self.adapter);
        surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm)
    }

    pub fn get_current_texture(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    fn create_surface_config(&self, width: u32, height: u32) -> wgpu::SurfaceConfiguration {
        let surface_caps = self.surface.get_capabilities(&self.adapter);
        let surface_format = self.get_optimal_format();

        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }
}
