//! In-memory state shared between collection and export.
//!
//! Nothing is persisted: the store is rebuilt from scratch after a restart.

mod store;
mod tree;

pub use store::{CycleUpdate, SnapshotStore, SnapshotView, SourceSnapshot};
pub use tree::PerfValue;
