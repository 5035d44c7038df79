use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const EXIT_USAGE: u8 = 1;
pub const EXIT_INITIAL_BUILD: u8 = 2;
pub const EXIT_PLATFORM: u8 = 3;

const DEFAULT_VERTEX_FILE: &str = "shader.vert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// Stat the fragment shader every frame
    Poll,
    /// Stat only after a filesystem notification
    Notify,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    shaderlive plasma.frag                          # Uses shader.vert next to plasma.frag
    shaderlive --vertex quad.vert plasma.frag       # Explicit vertex shader
    shaderlive --fps 30 --watch notify plasma.frag  # Slower frames, event-driven reload
    shaderlive --allow-broken-start wip.frag        # Open the window even if wip.frag fails")]
pub struct Cli {
    /// Path to the GLSL fragment shader to preview and watch
    pub shader_file: PathBuf,

    /// Vertex shader [default: shader.vert next to the fragment shader]
    #[arg(long, value_name = "PATH")]
    pub vertex: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Frames per second the render loop is paced at
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub fps: u32,

    /// How changes to the fragment shader are detected
    #[arg(long, value_enum, default_value_t = WatchMode::Poll)]
    pub watch: WatchMode,

    /// Open the window even when the first build fails
    #[arg(long)]
    pub allow_broken_start: bool,
}

/// The two shader files a program is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Cli {
    /// Parses the command line. Usage errors exit with `EXIT_USAGE`; help and
    /// version output exit successfully.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(err) => {
                let _ = err.print();
                let code = if err.use_stderr() { EXIT_USAGE.into() } else { 0 };
                process::exit(code);
            }
        }
    }

    pub fn shader_paths(&self) -> ShaderPaths {
        let vertex = self
            .vertex
            .clone()
            .unwrap_or_else(|| default_vertex_path(&self.shader_file));

        ShaderPaths {
            vertex,
            fragment: self.shader_file.clone(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn default_vertex_path(fragment: &Path) -> PathBuf {
    match fragment.parent() {
        Some(parent) => parent.join(DEFAULT_VERTEX_FILE),
        None => PathBuf::from(DEFAULT_VERTEX_FILE),
    }
}
