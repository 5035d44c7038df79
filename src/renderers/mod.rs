pub mod window;
pub mod window_renderer;

pub use window::FrameClock;
pub use window_renderer::WindowRenderer;
