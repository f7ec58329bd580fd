//! Flattening of snapshots into typed, labeled samples.

use std::collections::BTreeMap;

use tracing::debug;

use crate::collector::health::{HealthCheck, HealthRecord};
use crate::export::schema::{SchemaEntry, ValueKind, lookup, series_name};
use crate::storage::{PerfValue, SnapshotView, SourceSnapshot};

/// Label value of the cluster health series.
pub const HEALTH_DEVICE: &str = "mon";

/// One series value ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub help: String,
    pub kind: ValueKind,
    /// Value of the single `device` label; `None` for unlabeled series.
    pub device: Option<String>,
    pub value: f64,
}

impl Sample {
    fn gauge(
        name: impl Into<String>,
        help: impl Into<String>,
        device: Option<&str>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: ValueKind::Gauge,
            device: device.map(str::to_owned),
            value,
        }
    }
}

/// Emits every series of a consistent store view: per-source counters in
/// socket order, then cluster health.
pub fn collect_samples(view: &SnapshotView<'_>) -> Vec<Sample> {
    let mut samples = Vec::new();
    for (socket, source) in view.sources() {
        flatten_source(socket, source, &mut samples);
    }
    if let Some(health) = view.health() {
        health_samples(health, &mut samples);
    }
    samples
}

/// Flattens one source snapshot.
///
/// Handles top-level counters (`{"op": 42}`, `{"op_latency": {"sum": 1.5}}`)
/// as well as the usual `section -> counter -> number | {leaf: number}`
/// nesting. A counter without a schema entry for its exact path is skipped.
pub fn flatten_source(socket: &str, source: &SourceSnapshot, out: &mut Vec<Sample>) {
    let Some(prefix) = source.device.kind.metric_prefix() else {
        return;
    };
    let Some(counters) = source.counters.as_map() else {
        return;
    };
    let device = source.device.name.as_str();
    let schema = source.schema.as_ref();

    for (name, value) in counters {
        match value {
            PerfValue::Number(v) => match lookup(schema, name, None) {
                Some(entry) => out.push(sample(prefix, &[name.as_str()], entry, device, *v)),
                None => debug!(socket, counter = name.as_str(), "no schema entry, skipping"),
            },
            PerfValue::Map(fields) => match lookup(schema, name, None) {
                // A top-level aggregate (`{"op_latency": {"avgcount": 3, "sum": 1.5}}`)
                // described by a single entry.
                Some(entry) => push_leaves(prefix, &[name.as_str()], fields, entry, device, out),
                None => {
                    for (field, value) in fields {
                        let Some(entry) = lookup(schema, name, Some(field)) else {
                            debug!(
                                socket,
                                counter = name.as_str(),
                                field = field.as_str(),
                                "no schema entry, skipping"
                            );
                            continue;
                        };
                        let path = [name.as_str(), field.as_str()];
                        match value {
                            PerfValue::Number(v) => {
                                out.push(sample(prefix, &path, entry, device, *v));
                            }
                            PerfValue::Map(leaves) => {
                                push_leaves(prefix, &path, leaves, entry, device, out);
                            }
                            _ => {}
                        }
                    }
                }
            },
            _ => {}
        }
    }
}

/// Emits one series per numeric leaf of an aggregate such as avgcount/sum.
/// Leaves share the parent's description.
fn push_leaves(
    prefix: &str,
    parent: &[&str],
    leaves: &BTreeMap<String, PerfValue>,
    entry: SchemaEntry<'_>,
    device: &str,
    out: &mut Vec<Sample>,
) {
    for (leaf, v) in leaves {
        if let Some(v) = v.as_number() {
            let mut path = parent.to_vec();
            path.push(leaf.as_str());
            out.push(sample(prefix, &path, entry, device, v));
        }
    }
}

fn sample(
    prefix: &str,
    path: &[&str],
    entry: SchemaEntry<'_>,
    device: &str,
    value: f64,
) -> Sample {
    let name = series_name(prefix, path);
    let help = if entry.description.trim().is_empty() {
        path.join(".")
    } else {
        entry.description.to_string()
    };
    Sample {
        name,
        help,
        kind: entry.kind,
        device: Some(device.to_string()),
        value,
    }
}

/// Emits the cluster health gauges, labeled `device="mon"`.
pub fn health_samples(health: &HealthRecord, out: &mut Vec<Sample>) {
    let device = Some(HEALTH_DEVICE);
    for check in HealthCheck::ALL {
        out.push(Sample::gauge(
            check.metric_name(),
            check.help(),
            device,
            health.count(check) as f64,
        ));
    }
    out.push(Sample::gauge(
        "ceph_cluster_health_status",
        "Health status of Cluster, can vary only between 3 states (err:2, warn:1, ok:0)",
        device,
        f64::from(health.status.code()),
    ));
    for (name, help, value) in health.pgmap.metrics() {
        out.push(Sample::gauge(name, help, device, value));
    }
}

/// The unlabeled scrape duration gauge.
pub fn scrape_time_sample(seconds: f64) -> Sample {
    Sample::gauge(
        "ceph_exporter_scrape_time",
        "Duration of a collector scrape",
        None,
        seconds,
    )
}
