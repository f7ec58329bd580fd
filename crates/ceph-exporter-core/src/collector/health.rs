//! Cluster health extraction from `ceph status -f json`.
//!
//! The health section lists active checks either as structured `checks`
//! (Luminous and later) or as a legacy free-text `summary`. Whichever is
//! present is rendered to one string and a table of patterns pulls the
//! placement group and object counts out of it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// Error type for health extraction.
#[derive(Debug)]
pub enum HealthError {
    /// The status payload is not valid JSON.
    Parse(serde_json::Error),
}

impl std::fmt::Display for HealthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthError::Parse(e) => write!(f, "invalid status JSON: {}", e),
        }
    }
}

impl std::error::Error for HealthError {}

/// Overall cluster health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warn,
    /// `HEALTH_ERR`, and any status that is missing or not recognized.
    Err,
}

impl HealthStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "HEALTH_OK" => HealthStatus::Ok,
            "HEALTH_WARN" => HealthStatus::Warn,
            _ => HealthStatus::Err,
        }
    }

    /// Value of `ceph_cluster_health_status`.
    pub fn code(self) -> u8 {
        match self {
            HealthStatus::Ok => 0,
            HealthStatus::Warn => 1,
            HealthStatus::Err => 2,
        }
    }
}

/// Counts extracted from the health check text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthCheck {
    PgsDegraded,
    PgsUndersized,
    PgsStuckDegraded,
    PgsStuckUnclean,
    PgsBackfill,
    PgsBackfillToofull,
    PgsBackfillWait,
    PgsRecoveryWait,
    PgsPeering,
    ObjectsDegraded,
    ObjectsMisplaced,
}

impl HealthCheck {
    pub const ALL: [HealthCheck; 11] = [
        HealthCheck::PgsDegraded,
        HealthCheck::PgsUndersized,
        HealthCheck::PgsStuckDegraded,
        HealthCheck::PgsStuckUnclean,
        HealthCheck::PgsBackfill,
        HealthCheck::PgsBackfillToofull,
        HealthCheck::PgsBackfillWait,
        HealthCheck::PgsRecoveryWait,
        HealthCheck::PgsPeering,
        HealthCheck::ObjectsDegraded,
        HealthCheck::ObjectsMisplaced,
    ];

    pub fn metric_name(self) -> &'static str {
        match self {
            HealthCheck::PgsDegraded => "ceph_cluster_pgs_degraded",
            HealthCheck::PgsUndersized => "ceph_cluster_pgs_undersized",
            HealthCheck::PgsStuckDegraded => "ceph_cluster_pgs_stuck_degraded",
            HealthCheck::PgsStuckUnclean => "ceph_cluster_pgs_stuck_unclean",
            HealthCheck::PgsBackfill => "ceph_cluster_pgs_backfill",
            HealthCheck::PgsBackfillToofull => "ceph_cluster_pgs_backfill_toofull",
            HealthCheck::PgsBackfillWait => "ceph_cluster_pgs_backfill_wait",
            HealthCheck::PgsRecoveryWait => "ceph_cluster_pgs_recovery_wait",
            HealthCheck::PgsPeering => "ceph_cluster_pgs_peering",
            HealthCheck::ObjectsDegraded => "ceph_cluster_objects_degraded",
            HealthCheck::ObjectsMisplaced => "ceph_cluster_objects_misplaced",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            HealthCheck::PgsDegraded => "Number of degraded PGs",
            HealthCheck::PgsUndersized => "Number of undersized PGs",
            HealthCheck::PgsStuckDegraded => "Number of stuck degraded PGs",
            HealthCheck::PgsStuckUnclean => "Number of stuck unclean PGs",
            HealthCheck::PgsBackfill => "Number of PGs backfilling",
            HealthCheck::PgsBackfillToofull => "Number of PGs too full",
            HealthCheck::PgsBackfillWait => "Number of PGs waiting to backfill",
            HealthCheck::PgsRecoveryWait => "Number of PGs waiting for recovery",
            HealthCheck::PgsPeering => "Number of peering PGs",
            HealthCheck::ObjectsDegraded => "Number of degraded objects in a cluster",
            HealthCheck::ObjectsMisplaced => "Number of misplaced objects in a cluster",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            HealthCheck::PgsDegraded => r"(\d+) pgs degraded",
            HealthCheck::PgsUndersized => r"(\d+) pgs undersized",
            HealthCheck::PgsStuckDegraded => r"(\d+) pgs stuck degraded",
            HealthCheck::PgsStuckUnclean => r"(\d+) pgs stuck unclean",
            HealthCheck::PgsBackfill => r"(\d+) pgs backfilling",
            HealthCheck::PgsBackfillToofull => r"(\d+) pgs backfill_toofull",
            HealthCheck::PgsBackfillWait => r"(\d+) pgs backfill_wait",
            HealthCheck::PgsRecoveryWait => r"(\d+) pgs recovery_wait",
            HealthCheck::PgsPeering => r"(\d+) pgs peering",
            HealthCheck::ObjectsDegraded => r"(\d+)/(\d+) objects degraded",
            HealthCheck::ObjectsMisplaced => r"(\d+)/(\d+) objects misplaced",
        }
    }
}

static CHECK_PATTERNS: LazyLock<Vec<(HealthCheck, Regex)>> = LazyLock::new(|| {
    HealthCheck::ALL
        .iter()
        .map(|&check| {
            let re = Regex::new(check.pattern()).expect("static health pattern");
            (check, re)
        })
        .collect()
});

/// Cluster-wide placement group map statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PgMapStats {
    pub num_pgs: f64,
    #[serde(rename = "read_bytes_sec")]
    pub read_bytes_per_sec: f64,
    #[serde(rename = "write_bytes_sec")]
    pub write_bytes_per_sec: f64,
    pub read_op_per_sec: f64,
    pub write_op_per_sec: f64,
    pub recovering_objects_per_sec: f64,
    pub recovering_bytes_per_sec: f64,
}

impl PgMapStats {
    /// `(metric name, help, value)` for each statistic.
    pub fn metrics(&self) -> [(&'static str, &'static str, f64); 7] {
        [
            ("ceph_cluster_pgs_total", "Total number of PGs", self.num_pgs),
            (
                "ceph_cluster_read_bytes_sec",
                "Client read throughput in bytes per second",
                self.read_bytes_per_sec,
            ),
            (
                "ceph_cluster_write_bytes_sec",
                "Client write throughput in bytes per second",
                self.write_bytes_per_sec,
            ),
            (
                "ceph_cluster_read_op_per_sec",
                "Client read operations per second",
                self.read_op_per_sec,
            ),
            (
                "ceph_cluster_write_op_per_sec",
                "Client write operations per second",
                self.write_op_per_sec,
            ),
            (
                "ceph_cluster_recovering_objects_per_sec",
                "Objects recovered per second",
                self.recovering_objects_per_sec,
            ),
            (
                "ceph_cluster_recovering_bytes_per_sec",
                "Bytes recovered per second",
                self.recovering_bytes_per_sec,
            ),
        ]
    }
}

/// Health of the cluster at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub status: HealthStatus,
    counts: BTreeMap<HealthCheck, u64>,
    pub pgmap: PgMapStats,
}

impl HealthRecord {
    /// Count for one check, 0 when the check text did not mention it.
    pub fn count(&self, check: HealthCheck) -> u64 {
        self.counts.get(&check).copied().unwrap_or(0)
    }
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: HealthStatus::Err,
            counts: BTreeMap::new(),
            pgmap: PgMapStats::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClusterStatus {
    health: HealthSection,
    pgmap: PgMapStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HealthSection {
    status: Option<String>,
    overall_status: Option<String>,
    checks: Option<serde_json::Value>,
    summary: Option<serde_json::Value>,
}

/// Extracts the health record from a `ceph status -f json` payload.
pub fn extract_health(payload: &[u8]) -> Result<HealthRecord, HealthError> {
    let status: ClusterStatus = serde_json::from_slice(payload).map_err(HealthError::Parse)?;
    let health = status.health;

    let status_str = health
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(health.overall_status.as_deref());
    let overall = status_str.map_or(HealthStatus::Err, HealthStatus::parse);

    let text = match (&health.checks, &health.summary) {
        (Some(checks), _) => {
            debug!("using structured health checks");
            checks.to_string()
        }
        (None, Some(summary)) => {
            debug!("using legacy health summary");
            summary.to_string()
        }
        (None, None) => String::new(),
    };

    Ok(HealthRecord {
        status: overall,
        counts: extract_counts(&text),
        pgmap: status.pgmap,
    })
}

/// Applies the check patterns to `text`. Checks that do not match are absent.
fn extract_counts(text: &str) -> BTreeMap<HealthCheck, u64> {
    let mut counts = BTreeMap::new();
    for (check, re) in CHECK_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        match caps[1].parse::<u64>() {
            Ok(value) => {
                counts.insert(*check, value);
            }
            Err(e) => {
                debug!(check = check.metric_name(), error = %e, "cannot parse health count");
            }
        }
    }
    counts
}
