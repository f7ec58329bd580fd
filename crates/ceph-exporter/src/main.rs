//! ceph-exporter - Prometheus exporter for Ceph daemon admin sockets.
//!
//! Collects `perf dump` counters from every admin socket on the host and the
//! cluster health from `ceph status` on a fixed interval, and serves the latest
//! snapshot on `/metrics`.

mod background;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use ceph_exporter_core::VERSION;
use ceph_exporter_core::collector::{
    AdminClient, Collector, CollectorConfig, RealFs, SystemRunner,
};
use ceph_exporter_core::export::Exporter;
use ceph_exporter_core::storage::SnapshotStore;
use ceph_exporter_core::util::local_hostname;

use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "ceph-exporter",
    about = "Prometheus exporter for Ceph admin sockets",
    version = VERSION
)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9353", env = "CEPH_EXPORTER_LISTEN")]
    listen: SocketAddr,

    /// Directory containing the daemon admin sockets.
    #[arg(long, default_value = "/var/run/ceph", env = "CEPH_EXPORTER_ASOK_PATH")]
    asok_path: PathBuf,

    /// Collection interval in seconds.
    #[arg(
        long,
        default_value = "15",
        env = "CEPH_EXPORTER_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Collect cluster health from `ceph status`. Disable with --health=false.
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "CEPH_EXPORTER_HEALTH"
    )]
    health: bool,

    /// Cluster configuration file passed to `ceph status`.
    #[arg(long, default_value = "/etc/ceph/ceph.conf", env = "CEPH_EXPORTER_CEPH_CONFIG")]
    ceph_config: String,

    /// Path or name of the `ceph` command line tool.
    #[arg(long, default_value = "ceph", env = "CEPH_EXPORTER_CEPH_BINARY")]
    ceph_binary: String,

    /// Timeout of a single `ceph` invocation in seconds (0 disables).
    #[arg(long, default_value = "10", env = "CEPH_EXPORTER_COMMAND_TIMEOUT")]
    command_timeout: u64,

    /// Cycles a vanished admin socket keeps its series before they are dropped
    /// (0 keeps them forever).
    #[arg(long, default_value = "4", env = "CEPH_EXPORTER_STALE_CYCLES")]
    stale_cycles: u32,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

/// Initializes the tracing subscriber with the appropriate log level.
/// `RUST_LOG` directives for other targets are kept.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["ceph_exporter", "ceph_exporter_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn async_main(args: Args) {
    let hostname = local_hostname();
    info!(
        version = VERSION,
        hostname = hostname.as_str(),
        asok_path = %args.asok_path.display(),
        interval_s = args.interval,
        health = args.health,
        "starting ceph exporter"
    );

    let timeout = (args.command_timeout > 0).then(|| Duration::from_secs(args.command_timeout));
    let client = AdminClient::new(
        SystemRunner::new(timeout),
        &args.ceph_binary,
        &args.ceph_config,
        &hostname,
    );
    let config = CollectorConfig {
        asok_dir: args.asok_path.clone(),
        health_enabled: args.health,
        stale_cycles: args.stale_cycles,
    };
    let collector = match Collector::new(RealFs::new(), client, &config) {
        Ok(collector) => collector,
        Err(e) => {
            error!(error = %e, "cannot watch admin socket directory");
            process::exit(1);
        }
    };

    let store = Arc::new(SnapshotStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collect_task = tokio::spawn(background::collect_loop(
        collector,
        store.clone(),
        Duration::from_secs(args.interval),
        shutdown_rx,
    ));

    let app =
        handlers::router(AppState::new(Exporter::new(store))).layer(CompressionLayer::new());

    let listener = match tokio::net::TcpListener::bind(args.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %args.listen, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(addr = %args.listen, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        error!(error = %e, "server error");
    }

    if let Err(e) = collect_task.await {
        error!(error = %e, "collection loop failed");
    }
    info!("stopped");
}

/// Resolves on Ctrl-C or SIGTERM and tells the collection loop to stop.
async fn shutdown_signal(tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("received shutdown signal");
    let _ = tx.send(true);
}
