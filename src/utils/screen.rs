use winit::dpi::PhysicalPosition;
use winit::event_loop::ActiveEventLoop;

// AIDEV-NOTE: Calculate centered window position using the active event loop
pub fn get_centered_window_position(
    event_loop: &ActiveEventLoop,
    window_size: (u32, u32),
) -> PhysicalPosition<i32> {
    match event_loop.primary_monitor() {
        Some(monitor) => {
            let monitor_size = monitor.size();
            centered_position((monitor_size.width, monitor_size.height), window_size)
        }
        // Fallback to a reasonable default if monitor detection fails
        None => PhysicalPosition::new(100, 100),
    }
}

fn centered_position(monitor: (u32, u32), window: (u32, u32)) -> PhysicalPosition<i32> {
    let x = (i64::from(monitor.0) - i64::from(window.0)) / 2;
    let y = (i64::from(monitor.1) - i64::from(window.1)) / 2;
    PhysicalPosition::new(x.max(0) as i32, y.max(0) as i32)
}
