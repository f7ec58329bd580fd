//! Read-only admin commands against Ceph daemons and the cluster.
//!
//! Three commands are used:
//! - `ceph --admin-daemon <socket> perf schema` - counter types and descriptions
//! - `ceph --admin-daemon <socket> perf dump` - current counter values
//! - `ceph -c <config> status -f json` - cluster health
//!
//! Any failure (non-zero exit, timeout, empty or malformed output) is returned
//! as `FetchError`; callers treat it as "no data this cycle".

use tracing::debug;

use crate::collector::command::{CommandError, CommandRunner};
use crate::storage::PerfValue;
use crate::util::short_hostname;

/// Counter section name used by RADOS gateways, suffixed with the host name.
const GATEWAY_SECTION: &str = "client.radosgw";

/// Error type for admin command fetches.
#[derive(Debug)]
pub enum FetchError {
    /// The command could not be run or failed.
    Command(CommandError),
    /// The command succeeded but printed nothing.
    Empty,
    /// The output is not valid JSON.
    Malformed(serde_json::Error),
    /// The output is JSON but not an object.
    NotAnObject,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Command(e) => write!(f, "{}", e),
            FetchError::Empty => write!(f, "empty output"),
            FetchError::Malformed(e) => write!(f, "malformed JSON: {}", e),
            FetchError::NotAnObject => write!(f, "JSON output is not an object"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<CommandError> for FetchError {
    fn from(e: CommandError) -> Self {
        FetchError::Command(e)
    }
}

/// Client for the admin commands of one host.
pub struct AdminClient<R: CommandRunner> {
    runner: R,
    ceph_binary: String,
    ceph_config: String,
    /// `client.radosgw.<short-hostname>`, renamed to `client.radosgw` in payloads.
    gateway_key: Option<String>,
}

impl<R: CommandRunner> AdminClient<R> {
    /// Creates a client.
    ///
    /// # Arguments
    /// * `runner` - Command runner (real or mock)
    /// * `ceph_binary` - Path or name of the `ceph` CLI
    /// * `ceph_config` - Cluster configuration file used for `status`
    /// * `hostname` - Local hostname, used to make gateway counters host-agnostic
    pub fn new(
        runner: R,
        ceph_binary: impl Into<String>,
        ceph_config: impl Into<String>,
        hostname: &str,
    ) -> Self {
        let short = short_hostname(hostname);
        let gateway_key = (!short.is_empty()).then(|| format!("{GATEWAY_SECTION}.{short}"));
        Self {
            runner,
            ceph_binary: ceph_binary.into(),
            ceph_config: ceph_config.into(),
            gateway_key,
        }
    }

    /// Fetches the counter schema of one daemon.
    pub fn perf_schema(&self, socket: &str) -> Result<PerfValue, FetchError> {
        let raw = self.admin_daemon(socket, "schema")?;
        parse_payload(&raw, self.gateway_key.as_deref())
    }

    /// Fetches the current counter values of one daemon.
    pub fn perf_dump(&self, socket: &str) -> Result<PerfValue, FetchError> {
        let raw = self.admin_daemon(socket, "dump")?;
        parse_payload(&raw, self.gateway_key.as_deref())
    }

    /// Fetches the raw cluster status JSON.
    pub fn cluster_status(&self) -> Result<Vec<u8>, FetchError> {
        debug!(config = %self.ceph_config, "running ceph status");
        let raw = self.runner.run(
            &self.ceph_binary,
            &["-c", &self.ceph_config, "status", "-f", "json"],
        )?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::Empty);
        }
        Ok(raw)
    }

    fn admin_daemon(&self, socket: &str, verb: &str) -> Result<Vec<u8>, FetchError> {
        debug!(socket, verb, "querying admin socket");
        Ok(self
            .runner
            .run(&self.ceph_binary, &["--admin-daemon", socket, "perf", verb])?)
    }
}

/// Parses an admin command payload and applies the gateway key rewrite.
pub fn parse_payload(raw: &[u8], gateway_key: Option<&str>) -> Result<PerfValue, FetchError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::Empty);
    }
    let json: serde_json::Value = serde_json::from_slice(raw).map_err(FetchError::Malformed)?;
    let mut tree = PerfValue::from(json);
    if tree.as_map().is_none() {
        return Err(FetchError::NotAnObject);
    }
    if let Some(key) = gateway_key {
        rewrite_gateway_key(&mut tree, key);
    }
    Ok(tree)
}

/// Renames the host-specific gateway section to the host-agnostic one.
pub fn rewrite_gateway_key(tree: &mut PerfValue, key: &str) {
    let Some(map) = tree.as_map_mut() else {
        return;
    };
    if let Some(section) = map.remove(key) {
        debug!(key, "renaming host-specific gateway section");
        map.insert(GATEWAY_SECTION.to_string(), section);
    }
}
