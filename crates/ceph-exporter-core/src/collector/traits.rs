//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets socket discovery run against the real admin
//! socket directory or against an in-memory `MockFs` in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Abstraction for the filesystem operations used by discovery.
pub trait FileSystem: Send + Sync {
    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Checks if a path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// # Returns
    /// A vector of paths to entries in the directory, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}
