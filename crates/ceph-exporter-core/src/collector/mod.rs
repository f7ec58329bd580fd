//! Collection of Ceph daemon counters and cluster health.
//!
//! The collector discovers admin sockets, classifies them, fetches their
//! `perf schema` (cached) and `perf dump` (every cycle) through the `ceph` CLI,
//! and publishes the results into the shared [`SnapshotStore`](crate::storage::SnapshotStore).
//!
//! Filesystem and process access go through the [`FileSystem`] and
//! [`CommandRunner`] traits so the whole cycle can run against mocks.

pub mod command;
pub mod device;
pub mod discovery;
pub mod fetcher;
pub mod health;
pub mod mock;
pub mod schema_cache;
pub mod traits;

#[allow(clippy::module_inception)]
mod collector;

pub use collector::{Collector, CollectorConfig, CycleSummary};
pub use command::{CommandError, CommandRunner, SystemRunner};
pub use device::{Device, DeviceKind, classify};
pub use discovery::{DiscoveryError, SourceDiscovery};
pub use fetcher::{AdminClient, FetchError};
pub use health::{HealthCheck, HealthError, HealthRecord, HealthStatus, extract_health};
pub use schema_cache::SchemaCache;
pub use traits::{FileSystem, RealFs};
