//! Scoped file access
//!
//! Every read or write opens, transfers and closes within one call; errors
//! carry the offending path.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("I/O error at '{}': {source}", path.display())]
pub struct IoError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl IoError {
    fn at(path: &Path) -> impl FnOnce(std::io::Error) -> IoError + '_ {
        move |source| IoError {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub fn from_file(path: impl AsRef<Path>) -> Result<String, IoError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(IoError::at(path))
}

/// Write `contents`, creating parent directories, and return the absolute
/// path written.
pub fn to_file(path: impl AsRef<Path>, contents: &str) -> Result<PathBuf, IoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(IoError::at(parent))?;
    }
    fs::write(path, contents).map_err(IoError::at(path))?;
    fs::canonicalize(path).map_err(IoError::at(path))
}
