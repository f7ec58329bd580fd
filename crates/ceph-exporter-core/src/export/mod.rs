//! Export of the snapshot store as typed, labeled series.
//!
//! A scrape holds the store's read lock for its whole walk, flattens every
//! source snapshot against its own schema, appends the cluster health gauges
//! and the scrape duration, and encodes the result in the Prometheus text
//! format. Export never writes to the store.

mod encode;
mod samples;
mod schema;

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::storage::SnapshotStore;

pub use encode::{ExportError, content_type, encode_text};
pub use samples::{HEALTH_DEVICE, Sample, collect_samples, flatten_source, health_samples};
pub use schema::{
    SchemaEntry, ValueKind, lookup, missing_entries, normalize_metric_name, schema_entry,
    series_name,
};

/// Read side of the pipeline, shared by all HTTP handlers.
#[derive(Debug, Clone)]
pub struct Exporter {
    store: Arc<SnapshotStore>,
}

impl Exporter {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Produces every sample of the current snapshot plus `ceph_exporter_scrape_time`.
    pub fn scrape(&self) -> Vec<Sample> {
        let start = Instant::now();
        let mut samples = self.store.read(collect_samples);
        let elapsed = start.elapsed();
        samples.push(samples::scrape_time_sample(elapsed.as_secs_f64()));
        debug!(samples = samples.len(), elapsed_us = elapsed.as_micros() as u64, "scrape complete");
        samples
    }

    /// Scrapes and encodes in the Prometheus text format.
    pub fn render(&self) -> Result<String, ExportError> {
        encode_text(&self.scrape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::classify;
    use crate::collector::fetcher::AdminClient;
    use crate::collector::mock::{MockFs, MockRunner};
    use crate::collector::{Collector, CollectorConfig};
    use crate::storage::{CycleUpdate, PerfValue, SourceSnapshot};
    use serde_json::json;
    use std::path::PathBuf;
    use std::thread;

    const OSD1: &str = "/var/run/ceph/ceph-osd.1.asok";

    fn collect_once(fs: MockFs, runner: &MockRunner) -> Arc<SnapshotStore> {
        let client =
            AdminClient::new(runner.clone(), "ceph", "/etc/ceph/ceph.conf", "node1.example.com");
        let config = CollectorConfig {
            asok_dir: PathBuf::from("/var/run/ceph"),
            health_enabled: false,
            stale_cycles: 4,
        };
        let mut collector = Collector::new(fs, client, &config).unwrap();
        let store = Arc::new(SnapshotStore::new());
        collector.collect_cycle(&store);
        store
    }

    #[test]
    fn test_end_to_end_single_osd_counter() {
        let mut fs = MockFs::new();
        fs.add_file(OSD1);
        let runner = MockRunner::new();
        runner.add_daemon(
            OSD1,
            r#"{"op":{"type":10,"description":"Operations"}}"#,
            r#"{"op":42}"#,
        );
        let exporter = Exporter::new(collect_once(fs, &runner));

        let samples = exporter.scrape();
        let series: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.name != "ceph_exporter_scrape_time")
            .collect();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "ceph_osd_op");
        assert_eq!(series[0].kind, ValueKind::Counter);
        assert_eq!(series[0].value, 42.0);
        assert_eq!(series[0].device.as_deref(), Some("osd1"));

        let text = exporter.render().unwrap();
        assert!(text.contains("# TYPE ceph_osd_op counter"));
        assert!(text.contains("ceph_osd_op{device=\"osd1\"} 42"));
        assert!(text.contains("# TYPE ceph_exporter_scrape_time gauge"));
    }

    #[test]
    fn test_gateway_counters_host_agnostic() {
        let socket = "/var/run/ceph/ceph-client.radosgw.node1.asok";
        let mut fs = MockFs::new();
        fs.add_file(socket);
        let runner = MockRunner::new();
        runner.add_daemon(
            socket,
            r#"{"client.radosgw.node1":{"req":{"type":10,"description":"Requests"}}}"#,
            r#"{"client.radosgw.node1":{"req":17}}"#,
        );
        let exporter = Exporter::new(collect_once(fs, &runner));

        let text = exporter.render().unwrap();
        assert!(text.contains("ceph_radosgw_client_radosgw_req{device=\"radosgw\"} 17"));
        assert!(!text.contains("node1"));
    }

    #[test]
    fn test_scrape_empty_store() {
        let exporter = Exporter::new(Arc::new(SnapshotStore::new()));
        let samples = exporter.scrape();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "ceph_exporter_scrape_time");
        assert_eq!(samples[0].device, None);
    }

    #[test]
    fn test_scrape_does_not_mutate_store() {
        let store = Arc::new(SnapshotStore::new());
        store.publish(CycleUpdate {
            sources: vec![(
                OSD1.to_string(),
                SourceSnapshot {
                    device: classify(OSD1),
                    schema: Arc::new(PerfValue::from(json!({
                        "op": {"type": 10, "description": "ops"}
                    }))),
                    counters: PerfValue::from(json!({"op": 1})),
                },
            )],
            ..Default::default()
        });
        let exporter = Exporter::new(store.clone());
        exporter.scrape();
        exporter.scrape();
        assert_eq!(store.read(|view| view.cycles()), 1);
        assert_eq!(store.len(), 1);
    }

    /// A writer republishes the same socket with schema description `v{n}`
    /// paired with counter value `n`; every scrape must see matching pairs.
    #[test]
    fn test_snapshot_isolation_under_concurrent_publish() {
        fn update(n: u32) -> CycleUpdate {
            CycleUpdate {
                sources: vec![(
                    OSD1.to_string(),
                    SourceSnapshot {
                        device: classify(OSD1),
                        schema: Arc::new(PerfValue::from(json!({
                            "op": {"type": 10, "description": format!("v{n}")}
                        }))),
                        counters: PerfValue::from(json!({"op": n})),
                    },
                )],
                ..Default::default()
            }
        }

        let store = Arc::new(SnapshotStore::new());
        store.publish(update(0));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for n in 1..=500 {
                    store.publish(update(n));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let exporter = Exporter::new(store.clone());
                thread::spawn(move || {
                    for _ in 0..200 {
                        let samples = exporter.scrape();
                        let op = samples.iter().find(|s| s.name == "ceph_osd_op").unwrap();
                        assert_eq!(op.help, format!("v{}", op.value as u32));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.read(|view| view.cycles()), 501);
    }
}
