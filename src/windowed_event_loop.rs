use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::gpu::GpuInitError;
use crate::reload::{ReloadMonitor, TickOutcome};
use crate::renderers::{FrameClock, WindowRenderer};
use crate::utils::file_watcher::ModificationSource;
use crate::utils::validation::{BuildError, CompiledProgram};
use crate::utils::{get_centered_window_position, Cli, ShaderPaths};

const APP_NAME: &str = "shaderlive";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("initial build failed: {}", .0.summary())]
    InitialBuild(BuildError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] OsError),
    #[error(transparent)]
    Gpu(#[from] GpuInitError),
}

pub type WatchedMonitor = ReloadMonitor<Box<dyn ModificationSource>>;

// AIDEV-NOTE: Field order matters: the renderer (and its GPU objects) drops before the window
struct WindowedApp {
    renderer: Option<WindowRenderer>,
    window: Option<Arc<Window>>,
    monitor: WatchedMonitor,
    initial_program: Option<CompiledProgram>,
    cli: Cli,
    paths: ShaderPaths,
    clock: FrameClock,
    quit_requested: bool,
    error_state: Option<String>,
    fatal: Option<RunError>,
}

impl WindowedApp {
    fn new(
        cli: Cli,
        paths: ShaderPaths,
        monitor: WatchedMonitor,
        initial_program: Option<CompiledProgram>,
        initial_error: Option<String>,
    ) -> Self {
        let clock = FrameClock::new(cli.frame_interval());

        Self {
            renderer: None,
            window: None,
            monitor,
            initial_program,
            cli,
            paths,
            clock,
            quit_requested: false,
            error_state: initial_error,
            fatal: None,
        }
    }

    fn file_name(&self) -> String {
        self.paths
            .fragment
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.paths.fragment.display().to_string())
    }

    // AIDEV-NOTE: Window title carries the error state after a failed build
    fn update_window_title(&self) {
        if let Some(window) = &self.window {
            let title = match &self.error_state {
                Some(error) => format!("{APP_NAME} | {} | Error: {error}", self.file_name()),
                None => format!("{APP_NAME} | {}", self.file_name()),
            };
            window.set_title(&title);
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RunError> {
        let (width, height) = self.cli.window_size();
        let position = get_centered_window_position(event_loop, (width, height));

        let window_attributes = Window::default_attributes()
            .with_title(APP_NAME)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_position(position)
            .with_resizable(true);

        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuInitError::from)?;
        let window_size = window.inner_size();

        let mut renderer = WindowRenderer::new(
            &instance,
            surface,
            (window_size.width, window_size.height),
            &self.paths,
        )?;

        if let Some(compiled) = self.initial_program.take() {
            if let Err(e) = renderer.install(&compiled) {
                if !self.cli.allow_broken_start {
                    return Err(RunError::InitialBuild(e));
                }
                self.error_state = Some(e.summary());
            }
        }

        self.renderer = Some(renderer);
        self.window = Some(window);
        self.update_window_title();
        Ok(())
    }

    fn poll_reload(&mut self) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        match renderer.poll_reload(&mut self.monitor) {
            TickOutcome::Reloaded => {
                tracing::debug!(
                    "built from modification time {:?}",
                    self.monitor.watch_state().last_modified()
                );
                self.error_state = None;
                self.update_window_title();
            }
            TickOutcome::Failed(e) => {
                self.error_state = Some(e.summary());
                self.update_window_title();
            }
            TickOutcome::Unchanged | TickOutcome::Unobservable => {}
        }
    }

    fn render(&mut self) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let time = self.clock.elapsed_at(Instant::now());
        match renderer.render(time) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated, reconfiguring");
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timed out, skipping frame");
            }
            Err(e) => {
                tracing::error!("render error: {e}");
                self.quit_requested = true;
            }
        }
    }
}

impl ApplicationHandler for WindowedApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create_window(event_loop) {
            tracing::error!("{e}");
            self.fatal = Some(e);
            event_loop.exit();
            return;
        }

        if self
            .renderer
            .as_ref()
            .is_some_and(|renderer| !renderer.has_program())
        {
            tracing::info!("no program installed yet, showing the clear colour");
        }
        tracing::info!(
            "watching {} (Escape or Q to quit)",
            self.monitor.watch_state().path().display()
        );
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::debug!("window close requested");
                self.quit_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.quit_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    // AIDEV-NOTE: One frame per deadline: reload tick, then redraw; quit is honoured at the top of the next iteration
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.quit_requested {
            event_loop.exit();
            return;
        }

        let now = Instant::now();
        if self.clock.frame_due(now) {
            self.poll_reload();
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.clock.advance(now);
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.clock.next_frame()));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release GPU objects while the window they render into is still alive.
        self.renderer = None;
        self.window = None;
        tracing::debug!("released renderer and window");
    }
}

/// Opens the window and runs until quit. `initial_program` holds stages that
/// were compiled before the window existed; `None` starts with no program.
pub fn run_windowed_event_loop(
    cli: Cli,
    paths: ShaderPaths,
    monitor: WatchedMonitor,
    initial_program: Option<CompiledProgram>,
    initial_error: Option<String>,
) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    let mut app = WindowedApp::new(cli, paths, monitor, initial_program, initial_error);

    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
