//! Latest collected state of every admin socket and of cluster health.
//!
//! Written only by the collection cycle (`publish`), read only by
//! export (`read`). One reader-writer lock guards everything: a publish replaces
//! whole per-socket records under the write lock, and a reader holds the read
//! lock for its entire walk, so it never sees the schema of one cycle paired
//! with the counters of another.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::collector::device::Device;
use crate::collector::health::HealthRecord;
use crate::storage::tree::PerfValue;

/// Everything known about one admin socket, replaced as a unit.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub device: Device,
    pub schema: Arc<PerfValue>,
    pub counters: PerfValue,
}

/// Results of one collection cycle, buffered before publishing.
#[derive(Debug, Default)]
pub struct CycleUpdate {
    pub sources: Vec<(String, SourceSnapshot)>,
    /// `None` keeps the previously published health record.
    pub health: Option<HealthRecord>,
    /// Sockets to forget.
    pub evicted: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    sources: BTreeMap<String, SourceSnapshot>,
    health: Option<HealthRecord>,
    cycles: u64,
}

/// Read-only view handed to readers while the shared lock is held.
pub struct SnapshotView<'a> {
    inner: &'a StoreInner,
}

impl<'a> SnapshotView<'a> {
    /// Per-socket records in socket path order.
    pub fn sources(&self) -> impl Iterator<Item = (&'a str, &'a SourceSnapshot)> + 'a {
        let inner: &'a StoreInner = self.inner;
        inner.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn source(&self, socket: &str) -> Option<&'a SourceSnapshot> {
        let inner: &'a StoreInner = self.inner;
        inner.sources.get(socket)
    }

    pub fn health(&self) -> Option<&'a HealthRecord> {
        let inner: &'a StoreInner = self.inner;
        inner.health.as_ref()
    }

    /// Number of cycles published so far.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles
    }
}

/// Thread-safe snapshot store shared between the collector and the HTTP server.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<StoreInner>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one cycle's results under a single write lock.
    pub fn publish(&self, update: CycleUpdate) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for socket in &update.evicted {
            inner.sources.remove(socket);
        }
        for (socket, snapshot) in update.sources {
            inner.sources.insert(socket, snapshot);
        }
        if let Some(health) = update.health {
            inner.health = Some(health);
        }
        inner.cycles += 1;
    }

    /// Runs `f` with a consistent view of the store, holding the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&SnapshotView<'_>) -> T) -> T {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&SnapshotView { inner: &inner })
    }

    /// Socket paths currently held.
    pub fn sockets(&self) -> Vec<String> {
        self.read(|view| view.sources().map(|(socket, _)| socket.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.read(|view| view.inner.sources.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::classify;
    use crate::collector::health::HealthStatus;
    use serde_json::json;

    fn snapshot(socket: &str, value: f64) -> SourceSnapshot {
        SourceSnapshot {
            device: classify(socket),
            schema: Arc::new(PerfValue::from(json!({"op": {"type": 10, "description": "ops"}}))),
            counters: PerfValue::from(json!({"op": value})),
        }
    }

    #[test]
    fn test_publish_inserts_and_overwrites() {
        let store = SnapshotStore::new();
        store.publish(CycleUpdate {
            sources: vec![("a-osd.0.asok".into(), snapshot("a-osd.0.asok", 1.0))],
            ..Default::default()
        });
        store.publish(CycleUpdate {
            sources: vec![("a-osd.0.asok".into(), snapshot("a-osd.0.asok", 2.0))],
            ..Default::default()
        });

        assert_eq!(store.len(), 1);
        let value = store.read(|view| {
            view.source("a-osd.0.asok")
                .and_then(|s| s.counters.get("op"))
                .and_then(PerfValue::as_number)
        });
        assert_eq!(value, Some(2.0));
        assert_eq!(store.read(|view| view.cycles()), 2);
    }

    #[test]
    fn test_publish_keeps_untouched_sources_and_health() {
        let store = SnapshotStore::new();
        store.publish(CycleUpdate {
            sources: vec![
                ("a-osd.0.asok".into(), snapshot("a-osd.0.asok", 1.0)),
                ("a-osd.1.asok".into(), snapshot("a-osd.1.asok", 1.0)),
            ],
            health: Some(HealthRecord::default()),
            ..Default::default()
        });
        store.publish(CycleUpdate {
            sources: vec![("a-osd.1.asok".into(), snapshot("a-osd.1.asok", 5.0))],
            health: None,
            ..Default::default()
        });

        assert_eq!(store.sockets(), vec!["a-osd.0.asok", "a-osd.1.asok"]);
        let status = store.read(|view| view.health().map(|h| h.status));
        assert_eq!(status, Some(HealthStatus::Err));
    }

    #[test]
    fn test_publish_evicts() {
        let store = SnapshotStore::new();
        store.publish(CycleUpdate {
            sources: vec![("a-osd.0.asok".into(), snapshot("a-osd.0.asok", 1.0))],
            ..Default::default()
        });
        store.publish(CycleUpdate {
            evicted: vec!["a-osd.0.asok".into()],
            ..Default::default()
        });
        assert!(store.is_empty());
    }
}
