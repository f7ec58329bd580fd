//! ceph-exporter-core - collection and normalization pipeline for the Ceph exporter.
//!
//! Provides:
//! - `collector` - admin socket discovery, device classification, admin commands,
//!   schema cache, cluster health extraction and the collection cycle
//! - `storage` - payload tree and the shared snapshot store
//! - `export` - flattening snapshots into typed, labeled samples and the
//!   Prometheus text encoding
//! - `util` - hostname helpers

pub mod collector;
pub mod export;
pub mod storage;
pub mod util;

/// Crate version with the git revision it was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CEPH_EXPORTER_GIT_SHA"),
    ")"
);
