//! In-memory mock filesystem for testing discovery without a real socket directory.

use crate::collector::traits::FileSystem;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores file and directory paths in memory. Admin sockets carry no content
/// that discovery reads, so only the paths are tracked.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashSet<PathBuf>,
    directories: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path);
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Removes a file, simulating a daemon that stopped and unlinked its socket.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// A typical `/var/run/ceph` with one monitor, two OSDs and a manager.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();
        fs.add_file("/var/run/ceph/ceph-mon.a.asok");
        fs.add_file("/var/run/ceph/ceph-osd.0.asok");
        fs.add_file("/var/run/ceph/ceph-osd.1.asok");
        fs.add_file("/var/run/ceph/ceph-mgr.a.asok");
        fs
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl FileSystem for MockFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains(path) || self.directories.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let entries = self
            .files
            .iter()
            .chain(self.directories.iter())
            .filter(|p| p.parent().is_some_and(|parent| parent == path))
            .cloned()
            .collect();
        Ok(entries)
    }
}
