use bytemuck::{Pod, Zeroable};

/// Host view of the head of the shader uniform block (std140).
///
/// `u_time` sits at offset 0 and `u_resolution` at offset 8; any uniforms a
/// shader adds come after and stay zeroed.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Uniforms {
    pub time: f32,
    pub _padding: f32, // vec2 is 8-byte aligned
    pub resolution: [f32; 2],
}

impl Uniforms {
    pub fn new(width: u32, height: u32, time: f32) -> Self {
        Self {
            time,
            _padding: 0.0,
            resolution: [width as f32, height as f32],
        }
    }
}

pub struct UniformBuffer {
    pub buffer: wgpu::Buffer,
}

impl UniformBuffer {
    /// `block_size` is the largest uniform block any stage of the program declares.
    pub fn new(device: &wgpu::Device, block_size: u32) -> Self {
        let size = (block_size as wgpu::BufferAddress)
            .max(std::mem::size_of::<Uniforms>() as wgpu::BufferAddress)
            .next_multiple_of(16);

        // Zero-initialised, so uniforms the host never writes read as zero.
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self { buffer }
    }

    pub fn update(&self, queue: &wgpu::Queue, uniforms: &Uniforms) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }
}
