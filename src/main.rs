mod gpu;
mod reload;
mod renderers;
mod utils;
mod windowed_event_loop;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use reload::ReloadMonitor;
use utils::cli::{EXIT_INITIAL_BUILD, EXIT_PLATFORM};
use utils::file_watcher::{ModificationSource, NotifyWatcher, PollingStat};
use utils::validation::compile_program_sources;
use utils::{Cli, WatchMode};
use windowed_event_loop::{run_windowed_event_loop, RunError};

const DEFAULT_FILTER: &str =
    "info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";

fn main() -> ExitCode {
    let cli = Cli::parse_or_exit();
    initialise_tracing();

    let paths = cli.shader_paths();
    tracing::info!(
        "fragment {} / vertex {}",
        paths.fragment.display(),
        paths.vertex.display()
    );

    // Compile both stages before any window exists so a bad start fails headless.
    let source = modification_source(cli.watch, &paths.fragment);
    let (monitor, precheck) = ReloadMonitor::start(source, || {
        compile_program_sources(&paths.vertex, &paths.fragment)
    });
    let (initial_program, initial_error) = match precheck {
        Ok(compiled) => (Some(compiled), None),
        Err(e) if cli.allow_broken_start => {
            tracing::warn!("{}; starting without a program", e.summary());
            (None, Some(e.summary()))
        }
        Err(e) => {
            tracing::error!("initial build failed: {}", e.summary());
            return ExitCode::from(EXIT_INITIAL_BUILD);
        }
    };

    match run_windowed_event_loop(cli, paths, monitor, initial_program, initial_error) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::InitialBuild(_)) => ExitCode::from(EXIT_INITIAL_BUILD),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(EXIT_PLATFORM)
        }
    }
}

fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn modification_source(mode: WatchMode, fragment: &Path) -> Box<dyn ModificationSource> {
    match mode {
        WatchMode::Poll => Box::new(PollingStat::new(fragment)),
        WatchMode::Notify => match NotifyWatcher::new(fragment) {
            Ok(watcher) => Box::new(watcher),
            Err(e) => {
                tracing::warn!("file notifications unavailable ({e}), polling instead");
                Box::new(PollingStat::new(fragment))
            }
        },
    }
}
