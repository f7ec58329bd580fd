//! Background collection loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use ceph_exporter_core::collector::{Collector, CommandRunner, FileSystem};
use ceph_exporter_core::storage::SnapshotStore;

/// Runs one collection cycle per `interval` until `shutdown` fires.
///
/// A cycle is awaited before the next tick is taken, and ticks missed while a
/// cycle was running are skipped, so cycles never overlap.
pub(crate) async fn collect_loop<F, R>(
    collector: Collector<F, R>,
    store: Arc<SnapshotStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FileSystem + 'static,
    R: CommandRunner + 'static,
{
    let collector = Arc::new(Mutex::new(collector));
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut cycle_count: u64 = 0;

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => {
                info!("collection loop stopping");
                break;
            }
        }

        // Admin commands block; keep them off the async runtime.
        let collector = collector.clone();
        let store = store.clone();
        let t0 = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let mut collector = collector.lock().unwrap_or_else(PoisonError::into_inner);
            collector.collect_cycle(&store)
        })
        .await;

        let elapsed = t0.elapsed();

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "collection cycle panicked in spawn_blocking");
                continue;
            }
        };

        cycle_count += 1;
        if cycle_count == 1 {
            info!(
                duration_ms = elapsed.as_millis() as u64,
                discovered = summary.discovered,
                published = summary.published,
                failed = summary.failed,
                health = summary.health_refreshed,
                "first cycle collected"
            );
        } else {
            debug!(
                duration_ms = elapsed.as_millis() as u64,
                cycle_count,
                discovered = summary.discovered,
                published = summary.published,
                failed = summary.failed,
                skipped = summary.skipped,
                incomplete_schemas = summary.incomplete_schemas,
                evicted = summary.evicted,
                health = summary.health_refreshed,
                "cycle completed"
            );
        }

        if elapsed > interval / 2 {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "cycle exceeded 50% of interval"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceph_exporter_core::collector::mock::{MockFs, MockRunner};
    use ceph_exporter_core::collector::{AdminClient, CollectorConfig};

    #[tokio::test]
    async fn test_collect_loop_runs_and_stops() {
        let runner = MockRunner::new();
        runner.add_daemon(
            "/var/run/ceph/ceph-osd.0.asok",
            r#"{"op":{"type":10,"description":"Operations"}}"#,
            r#"{"op":1}"#,
        );
        let client = AdminClient::new(runner.clone(), "ceph", "/etc/ceph/ceph.conf", "node1");
        let config = CollectorConfig {
            health_enabled: false,
            ..CollectorConfig::default()
        };
        let collector = Collector::new(MockFs::typical_host(), client, &config).unwrap();
        let store = Arc::new(SnapshotStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(collect_loop(
            collector,
            store.clone(),
            Duration::from_secs(3600),
            rx,
        ));

        // The first tick fires immediately.
        for _ in 0..200 {
            if store.read(|view| view.cycles()) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.read(|view| view.cycles()), 1);
        assert_eq!(store.sockets(), vec!["/var/run/ceph/ceph-osd.0.asok"]);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        let dump = "--admin-daemon /var/run/ceph/ceph-osd.0.asok perf dump";
        assert_eq!(runner.call_count(dump), 1);
    }
}
