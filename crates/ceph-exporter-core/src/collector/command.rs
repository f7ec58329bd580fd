//! Execution of external read-only `ceph` commands.

use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How often a running command is polled for exit when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Error type for command execution.
#[derive(Debug)]
pub enum CommandError {
    /// The process could not be started.
    Spawn(io::Error),
    /// The process exited unsuccessfully.
    Exit(ExitStatus),
    /// The process did not finish in time and was killed.
    Timeout(Duration),
    /// I/O error while waiting for the process or reading its output.
    Io(io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Spawn(e) => write!(f, "failed to start command: {}", e),
            CommandError::Exit(status) => write!(f, "command failed: {}", status),
            CommandError::Timeout(d) => write!(f, "command timed out after {:?}", d),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}

/// Runs an external program and returns its standard output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError>;
}

/// Runs commands as child processes of the exporter.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// Creates a runner. `None` waits for commands indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn wait_with_deadline(
        &self,
        mut child: std::process::Child,
        timeout: Duration,
    ) -> Result<Vec<u8>, CommandError> {
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;
        // Drain stdout concurrently, otherwise a large dump fills the pipe
        // and the child never exits.
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    warn!(error = %e, "failed to kill timed out command");
                }
                let _ = child.wait();
                return Err(CommandError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = reader
            .join()
            .map_err(|_| io::Error::other("stdout reader panicked"))??;
        if !status.success() {
            return Err(CommandError::Exit(status));
        }
        Ok(output)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        debug!(program, ?args, "running command");
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let Some(timeout) = self.timeout else {
            let output = command.output().map_err(CommandError::Spawn)?;
            if !output.status.success() {
                return Err(CommandError::Exit(output.status));
            }
            return Ok(output.stdout);
        };

        let child = command.spawn().map_err(CommandError::Spawn)?;
        self.wait_with_deadline(child, timeout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let runner = SystemRunner::new(None);
        let out = runner.run("sh", &["-c", "printf '{\"a\": 1}'"]).unwrap();
        assert_eq!(out, b"{\"a\": 1}");
    }

    #[test]
    fn test_run_with_timeout_captures_stdout() {
        let runner = SystemRunner::new(Some(Duration::from_secs(5)));
        let out = runner.run("sh", &["-c", "echo hello"]).unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn test_run_non_zero_exit() {
        let runner = SystemRunner::new(Some(Duration::from_secs(5)));
        let result = runner.run("sh", &["-c", "exit 3"]);
        assert!(matches!(result, Err(CommandError::Exit(status)) if status.code() == Some(3)));
    }

    #[test]
    fn test_run_timeout_kills_child() {
        let runner = SystemRunner::new(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let result = runner.run("sleep", &["5"]);
        assert!(matches!(result, Err(CommandError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_missing_program() {
        let runner = SystemRunner::new(None);
        let result = runner.run("/nonexistent/ceph", &[]);
        assert!(matches!(result, Err(CommandError::Spawn(_))));
    }
}
