//! The timer-driven collection cycle.
//!
//! One cycle walks Discovering → per-source fetch → Publishing. Results are
//! buffered in a [`CycleUpdate`] and handed to the store in one call, so a
//! scrape never observes a half-finished cycle.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::collector::command::CommandRunner;
use crate::collector::device::{Device, classify};
use crate::collector::discovery::{DiscoveryError, SourceDiscovery};
use crate::collector::fetcher::AdminClient;
use crate::collector::health::{HealthRecord, extract_health};
use crate::collector::schema_cache::SchemaCache;
use crate::collector::traits::FileSystem;
use crate::export::missing_entries;
use crate::storage::{CycleUpdate, SnapshotStore, SourceSnapshot};

/// Library-side settings of the collection cycle.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Directory holding the `*.asok` files.
    pub asok_dir: PathBuf,
    /// Whether `ceph status` is queried each cycle.
    pub health_enabled: bool,
    /// Consecutive cycles a vanished socket is kept before eviction (0 = forever).
    pub stale_cycles: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            asok_dir: PathBuf::from("/var/run/ceph"),
            health_enabled: true,
            stale_cycles: 4,
        }
    }
}

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Sockets found on disk.
    pub discovered: usize,
    /// Sockets that could not be classified.
    pub skipped: usize,
    /// Sockets with a fresh snapshot.
    pub published: usize,
    /// Sockets whose schema or dump could not be fetched.
    pub failed: usize,
    /// Schemas dropped because the dump had counters they did not describe.
    pub incomplete_schemas: usize,
    /// Vanished sockets removed from the store.
    pub evicted: usize,
    pub health_refreshed: bool,
}

/// Bookkeeping of one classified socket between cycles.
#[derive(Debug, Default)]
struct Tracked {
    /// Consecutive cycles discovery did not report the socket.
    missing: u32,
    /// Whether the store holds a snapshot of the socket.
    published: bool,
}

/// Collects counter snapshots from every admin socket of the host.
pub struct Collector<F: FileSystem, R: CommandRunner> {
    discovery: SourceDiscovery<F>,
    client: AdminClient<R>,
    schemas: SchemaCache,
    health_enabled: bool,
    stale_cycles: u32,
    tracked: HashMap<String, Tracked>,
}

impl<F: FileSystem, R: CommandRunner> Collector<F, R> {
    /// Creates a collector.
    ///
    /// Fails only when the socket directory exists but is not a directory.
    pub fn new(
        fs: F,
        client: AdminClient<R>,
        config: &CollectorConfig,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self {
            discovery: SourceDiscovery::new(fs, config.asok_dir.clone())?,
            client,
            schemas: SchemaCache::new(),
            health_enabled: config.health_enabled,
            stale_cycles: config.stale_cycles,
            tracked: HashMap::new(),
        })
    }

    /// Number of cached schemas.
    pub fn cached_schemas(&self) -> usize {
        self.schemas.len()
    }

    /// Runs one full cycle and publishes its results into `store`.
    pub fn collect_cycle(&mut self, store: &SnapshotStore) -> CycleSummary {
        let sockets = self.discovery.list_sources();
        let mut summary = CycleSummary {
            discovered: sockets.len(),
            ..Default::default()
        };
        let mut update = CycleUpdate::default();

        for socket in &sockets {
            let device = classify(socket);
            if !device.is_known() {
                debug!(socket, "skipping unrecognized admin socket");
                summary.skipped += 1;
                continue;
            }

            self.tracked.entry(socket.clone()).or_default().missing = 0;
            match self.fetch_source(socket, device, &mut summary) {
                Some(snapshot) => {
                    if let Some(tracked) = self.tracked.get_mut(socket) {
                        tracked.published = true;
                    }
                    update.sources.push((socket.clone(), snapshot));
                }
                None => summary.failed += 1,
            }
        }

        update.evicted = self.expire_missing(&sockets);

        if self.health_enabled {
            update.health = self.fetch_health();
            summary.health_refreshed = update.health.is_some();
        }

        summary.published = update.sources.len();
        summary.evicted = update.evicted.len();
        store.publish(update);
        summary
    }

    fn fetch_source(
        &mut self,
        socket: &str,
        device: Device,
        summary: &mut CycleSummary,
    ) -> Option<SourceSnapshot> {
        let client = &self.client;
        let schema = match self.schemas.get_or_fetch(socket, || client.perf_schema(socket)) {
            Ok(schema) => schema,
            Err(e) => {
                // Daemons answer with nothing while they are still starting.
                debug!(socket, error = %e, "schema not available");
                return None;
            }
        };

        let counters = match client.perf_dump(socket) {
            Ok(counters) => counters,
            Err(e) => {
                warn!(socket, error = %e, "perf dump failed, keeping previous snapshot");
                return None;
            }
        };

        let missing = missing_entries(&schema, &counters);
        if missing > 0 {
            debug!(socket, missing, "schema does not cover dump, refetching next cycle");
            self.schemas.evict(socket);
            summary.incomplete_schemas += 1;
        }

        Some(SourceSnapshot {
            device,
            schema,
            counters,
        })
    }

    /// Ages sockets that discovery no longer reports and returns the published
    /// ones that reached `stale_cycles`.
    ///
    /// The cached schema of a vanished socket is dropped on the first missed
    /// cycle, so a daemon restarting under the same path is asked again.
    fn expire_missing(&mut self, discovered: &[String]) -> Vec<String> {
        let present: HashSet<&str> = discovered.iter().map(String::as_str).collect();
        let mut expired = Vec::new();
        for (socket, tracked) in &mut self.tracked {
            if present.contains(socket.as_str()) {
                continue;
            }
            tracked.missing = tracked.missing.saturating_add(1);
            if tracked.missing == 1 {
                self.schemas.evict(socket);
            }
            let stale = self.stale_cycles > 0 && tracked.missing >= self.stale_cycles;
            if !tracked.published || stale {
                expired.push(socket.clone());
            }
        }

        let mut evicted = Vec::with_capacity(expired.len());
        for socket in expired {
            let Some(tracked) = self.tracked.remove(&socket) else {
                continue;
            };
            if tracked.published {
                info!(socket = socket.as_str(), "admin socket gone, dropping its counters");
                evicted.push(socket);
            }
        }
        evicted
    }

    fn fetch_health(&self) -> Option<HealthRecord> {
        let raw = match self.client.cluster_status() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "ceph status failed, keeping previous health");
                return None;
            }
        };
        match extract_health(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                error!(error = %e, "cannot parse ceph status, keeping previous health");
                None
            }
        }
    }

    #[cfg(test)]
    fn fs_mut(&mut self) -> &mut F {
        self.discovery.fs_mut()
    }
}
