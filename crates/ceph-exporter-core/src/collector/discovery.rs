//! Discovery of Ceph admin sockets in the socket directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::traits::FileSystem;

/// File extension of Ceph admin sockets.
const SOCKET_EXTENSION: &str = "asok";

/// Error type for discovery setup.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The configured socket directory exists but is not a directory.
    NotADirectory(PathBuf),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::NotADirectory(path) => {
                write!(f, "admin socket path {} is not a directory", path.display())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Lists the admin sockets currently present in one directory.
pub struct SourceDiscovery<F: FileSystem> {
    fs: F,
    root: PathBuf,
}

impl<F: FileSystem> SourceDiscovery<F> {
    /// Creates a discovery rooted at `root`.
    ///
    /// A root that does not exist yet is accepted (daemons may not have started),
    /// a root that is a regular file is not.
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Result<Self, DiscoveryError> {
        let root = root.into();
        if fs.exists(&root) && !fs.is_dir(&root) {
            return Err(DiscoveryError::NotADirectory(root));
        }
        Ok(Self { fs, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[cfg(test)]
    pub(crate) fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// Returns the sorted socket paths found under the root.
    ///
    /// An unreadable or missing directory yields an empty list.
    pub fn list_sources(&self) -> Vec<String> {
        let entries = match self.fs.read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "cannot list admin sockets");
                return Vec::new();
            }
        };

        let mut sources: Vec<String> = entries
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == SOCKET_EXTENSION))
            .filter_map(|p| p.to_str().map(str::to_owned))
            .collect();
        sources.sort();

        debug!(count = sources.len(), path = %self.root.display(), "admin sockets discovered");
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::traits::RealFs;

    #[test]
    fn test_list_sources_filters_extension() {
        let mut fs = MockFs::typical_host();
        fs.add_file("/var/run/ceph/ceph.conf");
        fs.add_file("/var/run/ceph/ceph-osd.0.pid");

        let discovery = SourceDiscovery::new(fs, "/var/run/ceph").unwrap();
        let sources = discovery.list_sources();
        assert_eq!(
            sources,
            vec![
                "/var/run/ceph/ceph-mgr.a.asok",
                "/var/run/ceph/ceph-mon.a.asok",
                "/var/run/ceph/ceph-osd.0.asok",
                "/var/run/ceph/ceph-osd.1.asok",
            ]
        );
    }

    #[test]
    fn test_missing_root_is_empty() {
        let discovery = SourceDiscovery::new(MockFs::new(), "/var/run/ceph").unwrap();
        assert!(discovery.list_sources().is_empty());
    }

    #[test]
    fn test_root_is_file_is_fatal() {
        let mut fs = MockFs::new();
        fs.add_file("/var/run/ceph");
        let result = SourceDiscovery::new(fs, "/var/run/ceph");
        assert!(matches!(result, Err(DiscoveryError::NotADirectory(_))));
    }

    #[test]
    fn test_real_fs_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ceph-osd.3.asok"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let discovery = SourceDiscovery::new(RealFs::new(), dir.path()).unwrap();
        let sources = discovery.list_sources();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].ends_with("ceph-osd.3.asok"));
    }
}
