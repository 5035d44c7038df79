pub mod cli;
pub mod file_watcher;
pub mod screen;
pub mod shader_shell;
pub mod source_loader;
pub mod validation;

pub use cli::{Cli, ShaderPaths, WatchMode};
pub use screen::get_centered_window_position;
