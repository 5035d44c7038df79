pub mod state;
pub mod surfaces;

pub use state::FrameClock;
pub use surfaces::SurfaceManager;
