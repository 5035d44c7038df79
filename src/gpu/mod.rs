pub mod buffer;
pub mod device;
pub mod pipeline;
pub mod uniforms;

pub use buffer::*;
pub use device::*;
pub use pipeline::*;
pub use uniforms::*;
