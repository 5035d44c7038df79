use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shader text read from disk for a single build attempt.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("shader file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("could not read shader file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("short read on {}: expected {expected} bytes, got {actual}", path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("shader file {} is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },
}

// AIDEV-NOTE: Whole-file read; a length mismatch against the stat is a failure, never a partial source
pub fn load(path: &Path) -> Result<ShaderSource, LoadError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let mut file = File::open(path).map_err(io_error)?;
    let expected = file.metadata().map_err(io_error)?.len();

    let mut bytes = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut bytes).map_err(io_error)?;

    let actual = bytes.len() as u64;
    if actual < expected {
        return Err(LoadError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    let text = String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 {
        path: path.to_path_buf(),
    })?;

    Ok(ShaderSource {
        path: path.to_path_buf(),
        text,
    })
}
