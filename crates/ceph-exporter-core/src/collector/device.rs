//! Classification of admin sockets into Ceph daemon kinds.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Kind of Ceph daemon behind an admin socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Monitor,
    Osd,
    Radosgw,
    Mgr,
    Unknown,
}

impl DeviceKind {
    /// Prefix of every series emitted for this kind.
    pub fn metric_prefix(self) -> Option<&'static str> {
        match self {
            DeviceKind::Monitor => Some("ceph_monitor"),
            DeviceKind::Osd => Some("ceph_osd"),
            DeviceKind::Radosgw => Some("ceph_radosgw"),
            DeviceKind::Mgr => Some("ceph_mgr"),
            DeviceKind::Unknown => None,
        }
    }
}

/// Classified admin socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub kind: DeviceKind,
    /// Instance name used as the `device` label, e.g. `osd1`.
    pub name: String,
}

impl Device {
    pub fn is_known(&self) -> bool {
        self.kind != DeviceKind::Unknown
    }
}

struct Rule {
    marker: &'static str,
    kind: DeviceKind,
    name: Regex,
}

/// Evaluated top to bottom, first match wins.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        ("mon.", "mon", DeviceKind::Monitor),
        ("osd.", "osd", DeviceKind::Osd),
        ("radosgw.", "radosgw", DeviceKind::Radosgw),
        ("mgr.", "mgr", DeviceKind::Mgr),
    ]
    .into_iter()
    .map(|(marker, token, kind)| Rule {
        marker,
        kind,
        name: Regex::new(&format!("{token}(.[0-9]*)")).expect("static device name pattern"),
    })
    .collect()
});

/// Classifies a socket path by the daemon markers it contains.
///
/// `ceph-osd.1.asok` becomes `{Osd, "osd1"}`, `ceph-mon.a.asok` becomes
/// `{Monitor, "mon"}`. Paths without a marker are `Unknown` and must be skipped.
pub fn classify(identifier: &str) -> Device {
    for rule in RULES.iter() {
        if !identifier.contains(rule.marker) {
            continue;
        }
        let name = rule
            .name
            .find(identifier)
            .map(|m| m.as_str().replace('.', ""))
            .unwrap_or_default();
        debug!(socket = identifier, kind = ?rule.kind, name, "classified admin socket");
        return Device {
            kind: rule.kind,
            name,
        };
    }

    debug!(socket = identifier, "not a ceph daemon socket");
    Device {
        kind: DeviceKind::Unknown,
        name: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_osd() {
        let device = classify("/var/run/ceph/ceph-cluster-osd.1.asok");
        assert_eq!(device.kind, DeviceKind::Osd);
        assert_eq!(device.name, "osd1");
    }

    #[test]
    fn test_classify_monitor_without_number() {
        let device = classify("/var/run/ceph/ceph-cluster-mon.test-ceph-mon1.asok");
        assert_eq!(device.kind, DeviceKind::Monitor);
        assert_eq!(device.name, "mon");
    }

    #[test]
    fn test_classify_radosgw() {
        let device = classify("/var/run/ceph/ceph-cluster-client.radosgw.test-ceph-osd1.asok");
        assert_eq!(device.kind, DeviceKind::Radosgw);
        assert_eq!(device.name, "radosgw");
    }

    #[test]
    fn test_classify_mgr() {
        let device = classify("/var/run/ceph/ceph-mgr.x.asok");
        assert_eq!(device.kind, DeviceKind::Mgr);
        assert_eq!(device.name, "mgr");
    }

    #[test]
    fn test_classify_first_rule_wins() {
        // Contains both "radosgw." and "mgr."; radosgw is declared first.
        let device = classify("/var/run/ceph/ceph-cluster-client.radosgw.test-ceph-mgr.asok");
        assert_eq!(device.kind, DeviceKind::Radosgw);

        let device = classify("/var/run/ceph/ceph-mon.osd.3.asok");
        assert_eq!(device.kind, DeviceKind::Monitor);
    }

    #[test]
    fn test_classify_unknown() {
        let device = classify("/var/run/ceph/ceph-client.admin.asok");
        assert_eq!(device.kind, DeviceKind::Unknown);
        assert!(!device.is_known());
        assert!(device.kind.metric_prefix().is_none());
    }

    #[test]
    fn test_classify_deterministic() {
        let a = classify("/var/run/ceph/ceph-osd.12.asok");
        let b = classify("/var/run/ceph/ceph-osd.12.asok");
        assert_eq!(a, b);
        assert_eq!(a.name, "osd12");
    }
}
