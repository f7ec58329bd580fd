//! Prometheus text exposition of a sample set.
//!
//! Every scrape builds a fresh `Registry`, so series of sockets that vanished
//! disappear from the output without any unregistration bookkeeping.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::export::samples::Sample;
use crate::export::schema::ValueKind;

const DEVICE_LABEL: &str = "device";

/// Error type for the Prometheus encoding.
#[derive(Debug)]
pub enum ExportError {
    /// Encoding of the gathered families failed.
    Prometheus(prometheus::Error),
    /// The encoder produced non-UTF-8 output.
    Utf8(std::string::FromUtf8Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Prometheus(e) => write!(f, "prometheus encoding failed: {}", e),
            ExportError::Utf8(e) => write!(f, "encoded metrics are not UTF-8: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<prometheus::Error> for ExportError {
    fn from(e: prometheus::Error) -> Self {
        ExportError::Prometheus(e)
    }
}

impl From<std::string::FromUtf8Error> for ExportError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        ExportError::Utf8(e)
    }
}

/// Content type of the text exposition format.
pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}

/// One registered metric family.
enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
    PlainGauge(Gauge),
    PlainCounter(Counter),
}

impl Family {
    fn register(registry: &Registry, sample: &Sample) -> prometheus::Result<Self> {
        let opts = Opts::new(sample.name.as_str(), sample.help.as_str());
        let family = match (sample.kind, sample.device.is_some()) {
            (ValueKind::Gauge, true) => Family::Gauge(GaugeVec::new(opts, &[DEVICE_LABEL])?),
            (ValueKind::Counter, true) => {
                Family::Counter(CounterVec::new(opts, &[DEVICE_LABEL])?)
            }
            (ValueKind::Gauge, false) => Family::PlainGauge(Gauge::with_opts(opts)?),
            (ValueKind::Counter, false) => Family::PlainCounter(Counter::with_opts(opts)?),
        };
        registry.register(family.collector())?;
        Ok(family)
    }

    fn collector(&self) -> Box<dyn Collector> {
        match self {
            Family::Gauge(m) => Box::new(m.clone()),
            Family::Counter(m) => Box::new(m.clone()),
            Family::PlainGauge(m) => Box::new(m.clone()),
            Family::PlainCounter(m) => Box::new(m.clone()),
        }
    }

    /// Records `sample`; returns false when it does not fit this family.
    fn observe(&self, sample: &Sample) -> bool {
        if sample.kind == ValueKind::Counter && (sample.value.is_nan() || sample.value < 0.0) {
            return false;
        }
        match (self, sample.device.as_deref()) {
            (Family::Gauge(m), Some(device)) if sample.kind == ValueKind::Gauge => {
                m.with_label_values(&[device]).set(sample.value);
            }
            (Family::Counter(m), Some(device)) if sample.kind == ValueKind::Counter => {
                let counter = m.with_label_values(&[device]);
                counter.reset();
                counter.inc_by(sample.value);
            }
            (Family::PlainGauge(m), None) if sample.kind == ValueKind::Gauge => {
                m.set(sample.value);
            }
            (Family::PlainCounter(m), None) if sample.kind == ValueKind::Counter => {
                m.reset();
                m.inc_by(sample.value);
            }
            _ => return false,
        }
        true
    }
}

/// Counts labeled samples whose name and device repeat an earlier sample and
/// returns the first repeated pair.
///
/// Two admin sockets classified to the same device (`ceph-mon.a.asok` of two
/// clusters sharing a host) write the same series, and the later one wins.
fn label_collisions(samples: &[Sample]) -> (usize, Option<(&str, &str)>) {
    let mut seen = HashSet::new();
    let mut count = 0;
    let mut first = None;
    for sample in samples {
        let Some(device) = sample.device.as_deref() else {
            continue;
        };
        let key = (sample.name.as_str(), device);
        if !seen.insert(key) {
            count += 1;
            first.get_or_insert(key);
        }
    }
    (count, first)
}

/// Encodes `samples` in the Prometheus text format.
///
/// The first sample of a name decides the family's kind and help text. Later
/// samples of a different kind, counters with a negative or NaN value and
/// families the registry rejects are dropped. A series written twice keeps the
/// last value.
pub fn encode_text(samples: &[Sample]) -> Result<String, ExportError> {
    if let (collisions, Some((name, device))) = label_collisions(samples) {
        warn!(
            collisions,
            name = name,
            device,
            "several admin sockets map to the same device, later values win"
        );
    }

    let registry = Registry::new();
    let mut families: HashMap<&str, Option<Family>> = HashMap::new();

    for sample in samples {
        let family = match families.entry(sample.name.as_str()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => match Family::register(&registry, sample) {
                Ok(family) => e.insert(Some(family)),
                Err(err) => {
                    debug!(
                        name = sample.name.as_str(),
                        error = %err,
                        "cannot register metric family"
                    );
                    e.insert(None)
                }
            },
        };
        let Some(family) = family else {
            continue;
        };
        if !family.observe(sample) {
            debug!(
                name = sample.name.as_str(),
                device = sample.device.as_deref().unwrap_or(""),
                value = sample.value,
                "dropping sample that does not fit its family"
            );
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, kind: ValueKind, device: Option<&str>, value: f64) -> Sample {
        Sample {
            name: name.into(),
            help: format!("{name} help"),
            kind,
            device: device.map(str::to_owned),
            value,
        }
    }

    #[test]
    fn test_encode_counter_and_gauge() {
        let text = encode_text(&[
            sample("ceph_osd_op", ValueKind::Counter, Some("osd1"), 42.0),
            sample("ceph_osd_numpg", ValueKind::Gauge, Some("osd1"), 12.0),
            sample("ceph_osd_numpg", ValueKind::Gauge, Some("osd2"), 10.0),
        ])
        .unwrap();

        assert!(text.contains("# HELP ceph_osd_op ceph_osd_op help"));
        assert!(text.contains("# TYPE ceph_osd_op counter"));
        assert!(text.contains("ceph_osd_op{device=\"osd1\"} 42"));
        assert!(text.contains("# TYPE ceph_osd_numpg gauge"));
        assert!(text.contains("ceph_osd_numpg{device=\"osd1\"} 12"));
        assert!(text.contains("ceph_osd_numpg{device=\"osd2\"} 10"));
    }

    #[test]
    fn test_encode_unlabeled_gauge() {
        let text =
            encode_text(&[sample("ceph_exporter_scrape_time", ValueKind::Gauge, None, 0.25)])
                .unwrap();
        assert!(text.contains("ceph_exporter_scrape_time 0.25"));
    }

    #[test]
    fn test_kind_conflict_first_wins() {
        let text = encode_text(&[
            sample("ceph_osd_x", ValueKind::Gauge, Some("osd0"), 1.0),
            sample("ceph_osd_x", ValueKind::Counter, Some("osd1"), 2.0),
        ])
        .unwrap();
        assert!(text.contains("# TYPE ceph_osd_x gauge"));
        assert!(text.contains("ceph_osd_x{device=\"osd0\"} 1"));
        assert!(!text.contains("osd1"));
    }

    #[test]
    fn test_invalid_counter_values_dropped() {
        let text = encode_text(&[
            sample("ceph_osd_a", ValueKind::Counter, Some("osd0"), -1.0),
            sample("ceph_osd_a", ValueKind::Counter, Some("osd1"), f64::NAN),
            sample("ceph_osd_a", ValueKind::Counter, Some("osd2"), 3.0),
        ])
        .unwrap();
        assert!(!text.contains("osd0"));
        assert!(!text.contains("osd1\""));
        assert!(text.contains("ceph_osd_a{device=\"osd2\"} 3"));
    }

    #[test]
    fn test_duplicate_counter_not_accumulated() {
        let text = encode_text(&[
            sample("ceph_osd_op", ValueKind::Counter, Some("osd1"), 5.0),
            sample("ceph_osd_op", ValueKind::Counter, Some("osd1"), 7.0),
        ])
        .unwrap();
        assert!(text.contains("ceph_osd_op{device=\"osd1\"} 7"));
    }

    #[test]
    fn test_duplicate_device_gauge_last_wins() {
        let text = encode_text(&[
            sample("ceph_mon_num_sessions", ValueKind::Gauge, Some("mona"), 3.0),
            sample("ceph_mon_num_sessions", ValueKind::Gauge, Some("mona"), 8.0),
        ])
        .unwrap();
        assert!(text.contains("ceph_mon_num_sessions{device=\"mona\"} 8"));
        assert!(!text.contains("ceph_mon_num_sessions{device=\"mona\"} 3"));
    }

    #[test]
    fn test_label_collisions() {
        let samples = [
            sample("ceph_mon_num_sessions", ValueKind::Gauge, Some("mona"), 3.0),
            sample("ceph_mon_num_sessions", ValueKind::Gauge, Some("monb"), 4.0),
            sample("ceph_mon_num_sessions", ValueKind::Gauge, Some("mona"), 8.0),
            sample("ceph_mon_election_call", ValueKind::Counter, Some("mona"), 1.0),
            sample("ceph_mon_election_call", ValueKind::Counter, Some("mona"), 2.0),
            sample("ceph_exporter_scrape_time", ValueKind::Gauge, None, 0.1),
            sample("ceph_exporter_scrape_time", ValueKind::Gauge, None, 0.2),
        ];
        let (count, first) = label_collisions(&samples);
        assert_eq!(count, 2);
        assert_eq!(first, Some(("ceph_mon_num_sessions", "mona")));

        assert_eq!(label_collisions(&samples[..2]), (0, None));
    }

    #[test]
    fn test_invalid_name_skipped() {
        let text = encode_text(&[
            sample("ceph_osd_bad+name", ValueKind::Gauge, Some("osd0"), 1.0),
            sample("ceph_osd_good", ValueKind::Gauge, Some("osd0"), 2.0),
        ])
        .unwrap();
        assert!(!text.contains("bad"));
        assert!(text.contains("ceph_osd_good{device=\"osd0\"} 2"));
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(encode_text(&[]).unwrap(), "");
    }

    #[test]
    fn test_content_type() {
        assert!(content_type().starts_with("text/plain"));
    }
}
