//! Mock implementations for testing.
//!
//! This module provides `MockFs` and `MockRunner` for exercising discovery and
//! collection without a Ceph cluster or a real `/var/run/ceph`.

mod command;
mod filesystem;

pub use command::MockRunner;
pub use filesystem::MockFs;
