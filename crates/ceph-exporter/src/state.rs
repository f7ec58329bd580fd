//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use ceph_exporter_core::export::Exporter;

/// State handed to every HTTP handler. Cheap to clone.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) exporter: Exporter,
}

impl AppState {
    pub(crate) fn new(exporter: Exporter) -> Self {
        Self { exporter }
    }
}
