//! Per-socket cache of `perf schema` payloads.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::collector::fetcher::FetchError;
use crate::storage::PerfValue;

/// Schemas keyed by socket path.
///
/// A schema is fetched once per socket and reused until evicted. Failed and
/// empty fetches are never cached, so a daemon that is still starting is
/// retried on the next cycle.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: HashMap<String, Arc<PerfValue>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema for `socket`, running `fetch` on a miss.
    pub fn get_or_fetch(
        &mut self,
        socket: &str,
        fetch: impl FnOnce() -> Result<PerfValue, FetchError>,
    ) -> Result<Arc<PerfValue>, FetchError> {
        if let Some(schema) = self.entries.get(socket) {
            debug!(socket, "schema cache hit");
            return Ok(schema.clone());
        }

        debug!(socket, "schema cache miss, fetching");
        let schema = fetch()?;
        if schema.is_empty() {
            return Err(FetchError::Empty);
        }
        let schema = Arc::new(schema);
        self.entries.insert(socket.to_string(), schema.clone());
        Ok(schema)
    }

    /// Drops the schema of `socket`; the next `get_or_fetch` refetches it.
    pub fn evict(&mut self, socket: &str) -> bool {
        self.entries.remove(socket).is_some()
    }

    pub fn contains(&self, socket: &str) -> bool {
        self.entries.contains_key(socket)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
