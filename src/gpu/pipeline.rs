use std::cell::Cell;
use std::path::{Path, PathBuf};

use crate::gpu::{QuadGeometry, UniformBuffer, Uniforms};
use crate::utils::validation::{
    compile_program_sources, BuildError, CompiledProgram, CompiledStage,
};

/// A linked program: render pipeline plus the uniform buffer it reads.
///
/// Dropping it releases every GPU object it owns.
pub struct ShaderProgram {
    id: u64,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: UniformBuffer,
    bind_group: wgpu::BindGroup,
}

impl ShaderProgram {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &Uniforms) {
        self.uniform_buffer.update(queue, uniforms);
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        tracing::debug!("released program #{}", self.id);
    }
}

// AIDEV-NOTE: Builds programs from the shader files; layouts are shared so swapping programs never touches geometry
pub struct ProgramBuilder {
    device: wgpu::Device,
    surface_format: wgpu::TextureFormat,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    next_id: Cell<u64>,
}

impl ProgramBuilder {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            device: device.clone(),
            surface_format,
            bind_group_layout,
            pipeline_layout,
            vertex_path: vertex_path.to_path_buf(),
            fragment_path: fragment_path.to_path_buf(),
            next_id: Cell::new(1),
        }
    }

    /// Reads, compiles and links both shader files.
    pub fn build(&self) -> Result<ShaderProgram, BuildError> {
        let compiled = compile_program_sources(&self.vertex_path, &self.fragment_path)?;
        self.link(&compiled)
    }

    /// Links already compiled stages into a program.
    ///
    /// Everything is created inside a validation error scope, so interface
    /// mismatches between the stages, or between the stages and the fixed
    /// quad/uniform layout, come back as `LinkFailed` instead of a device error.
    pub fn link(&self, compiled: &CompiledProgram) -> Result<ShaderProgram, BuildError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        // Stage modules are only needed until the pipeline exists.
        let vertex_module = self.create_module(&compiled.vertex);
        let fragment_module = self.create_module(&compiled.fragment);

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shader Program"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some("main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[QuadGeometry::vertex_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some("main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        let uniform_buffer = UniformBuffer::new(&self.device, compiled.uniform_block_size());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.buffer.as_entire_binding(),
            }],
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            let log = error.to_string();
            tracing::error!(
                "failed to link {} with {}:\n{log}",
                self.fragment_path.display(),
                self.vertex_path.display()
            );
            return Err(BuildError::LinkFailed { log });
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        tracing::debug!("linked program #{id}");

        Ok(ShaderProgram {
            id,
            pipeline,
            uniform_buffer,
            bind_group,
        })
    }

    fn create_module(&self, compiled: &CompiledStage) -> wgpu::ShaderModule {
        let label = format!("{} stage", compiled.stage);
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(compiled.wgsl.as_str().into()),
            })
    }
}
