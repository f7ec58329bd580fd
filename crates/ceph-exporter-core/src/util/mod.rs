//! Utility functions for ceph-exporter.

use std::process;

/// Gets the machine hostname via the `hostname` command.
///
/// Returns an empty string when the command is unavailable.
pub fn local_hostname() -> String {
    process::Command::new("hostname")
        .output()
        .ok()
        .and_then(|out| {
            if out.status.success() {
                String::from_utf8(out.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_default()
}

/// Returns the hostname up to the first dot (`node1.example.com` → `node1`).
pub fn short_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname("node1.example.com"), "node1");
        assert_eq!(short_hostname("node1"), "node1");
        assert_eq!(short_hostname(""), "");
    }
}
