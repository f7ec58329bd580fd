//! Scripted command runner for testing the fetcher and the collection cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::collector::command::{CommandError, CommandRunner};

#[derive(Debug, Default)]
struct MockRunnerInner {
    responses: HashMap<String, Option<String>>,
    calls: Vec<String>,
}

/// Command runner answering from a table of canned outputs.
///
/// Commands are keyed by their arguments joined with spaces (the program name
/// is ignored). Unknown commands and commands registered with `fail` behave
/// like a `ceph` invocation that exited with status 1. Clones share state, so a
/// test can keep a handle while the collector owns another.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<MockRunnerInner>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `args` with `output` on stdout.
    pub fn respond(&self, args: &str, output: impl Into<String>) {
        self.lock().responses.insert(args.to_string(), Some(output.into()));
    }

    /// Makes `args` fail with a non-zero exit.
    pub fn fail(&self, args: &str) {
        self.lock().responses.insert(args.to_string(), None);
    }

    /// Number of times `args` was run.
    pub fn call_count(&self, args: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == args).count()
    }

    /// Registers `perf schema` and `perf dump` answers for one socket.
    pub fn add_daemon(&self, socket: &str, schema: &str, dump: &str) {
        self.respond(&format!("--admin-daemon {socket} perf schema"), schema);
        self.respond(&format!("--admin-daemon {socket} perf dump"), dump);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockRunnerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, _program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        let key = args.join(" ");
        let mut inner = self.lock();
        inner.calls.push(key.clone());
        match inner.responses.get(&key) {
            Some(Some(output)) => Ok(output.clone().into_bytes()),
            _ => Err(CommandError::Exit(failed_status())),
        }
    }
}

#[cfg(unix)]
fn failed_status() -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(1 << 8)
}

#[cfg(windows)]
fn failed_status() -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(1)
}
