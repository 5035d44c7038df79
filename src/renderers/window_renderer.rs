use crate::gpu::{GpuDevice, GpuInitError, ProgramBuilder, QuadGeometry, ShaderProgram, Uniforms};
use crate::reload::{ReloadMonitor, TickOutcome};
use crate::utils::file_watcher::ModificationSource;
use crate::utils::validation::{BuildError, CompiledProgram};
use crate::utils::ShaderPaths;

use super::window::SurfaceManager;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

// AIDEV-NOTE: Field order is teardown order: program, geometry, builder, surface, then the device
pub struct WindowRenderer {
    program: Option<ShaderProgram>,
    geometry: QuadGeometry,
    builder: ProgramBuilder,
    surface_manager: SurfaceManager,
    gpu_device: GpuDevice,
    width: u32,
    height: u32,
}

impl WindowRenderer {
    pub fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        window_size: (u32, u32),
        paths: &ShaderPaths,
    ) -> Result<Self, GpuInitError> {
        let (gpu_device, adapter) = GpuDevice::new_blocking(instance, &surface)?;
        let (width, height) = window_size;

        let surface_manager = SurfaceManager::new(surface, adapter);
        let surface_format = surface_manager.get_optimal_format();
        surface_manager.configure(&gpu_device.device, width, height);
        tracing::debug!("surface format {surface_format:?}, {width}x{height}");

        let geometry = QuadGeometry::new(&gpu_device.device);
        let builder = ProgramBuilder::new(
            &gpu_device.device,
            surface_format,
            &paths.vertex,
            &paths.fragment,
        );

        Ok(Self {
            program: None,
            geometry,
            builder,
            surface_manager,
            gpu_device,
            width,
            height,
        })
    }

    /// Links stages compiled before the window existed and installs the result.
    pub fn install(&mut self, compiled: &CompiledProgram) -> Result<(), BuildError> {
        let program = self.builder.link(compiled)?;
        tracing::info!("installed program #{}", program.id());
        self.program = Some(program);
        Ok(())
    }

    pub fn poll_reload<S: ModificationSource>(
        &mut self,
        monitor: &mut ReloadMonitor<S>,
    ) -> TickOutcome {
        let builder = &self.builder;
        monitor.tick(&mut self.program, || builder.build())
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.reconfigure();
    }

    /// Re-applies the current size after the surface was lost or outdated.
    pub fn reconfigure(&self) {
        self.surface_manager
            .configure(&self.gpu_device.device, self.width, self.height);
    }

    pub fn render(&mut self, time: f32) -> Result<(), wgpu::SurfaceError> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }

        let output = self.surface_manager.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(program) = &self.program {
            let uniforms = Uniforms::new(self.width, self.height, time);
            program.update_uniforms(&self.gpu_device.queue, &uniforms);
        }

        let mut encoder =
            self.gpu_device
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Window Render Encoder"),
                });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // Without a program the frame is just the clear colour.
            if let Some(program) = &self.program {
                program.bind(&mut render_pass);
                self.geometry.bind(&mut render_pass);
                render_pass.draw_indexed(0..self.geometry.index_count(), 0, 0..1);
            }
        }

        self.gpu_device
            .queue
            .submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
