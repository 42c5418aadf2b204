//! svcwatchd - Service resource monitoring agent.
//!
//! Periodically resolves active services to their backing processes, samples
//! CPU/memory/uptime once per distinct process, and retains a bounded
//! history per service. Serves a small command protocol to one local client
//! at a time over a Unix domain socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use svcwatch::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use svcwatch::collector::MockFs;
use svcwatch::collector::CgroupDirectory;
use svcwatch::config::EngineConfig;
use svcwatch::engine::{EngineError, MonitorEngine, ServiceLifecycle};

/// Service resource monitoring agent.
#[derive(Parser)]
#[command(name = "svcwatchd", about = "Service resource monitoring agent", version)]
struct Args {
    /// Monitoring interval in milliseconds (minimum 500).
    #[arg(short, long, default_value = "1000")]
    interval_ms: u64,

    /// Path of the channel socket.
    #[arg(short, long, default_value = "/run/svcwatch.sock")]
    socket: String,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Cgroup slice holding service units.
    #[arg(long, default_value = "/sys/fs/cgroup/system.slice")]
    slice_path: String,

    /// Retained samples per service.
    #[arg(long, default_value = "7200")]
    history_capacity: usize,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
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

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("svcwatchd={}", level).parse().unwrap())
        .add_directive(format!("svcwatch={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("svcwatchd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}ms, socket={}, slice={}, history={} samples/service",
        args.interval_ms, args.socket, args.slice_path, args.history_capacity
    );

    let config = EngineConfig {
        socket_path: args.socket.into(),
        proc_path: args.proc_path.clone(),
        slice_path: args.slice_path.clone(),
        interval_ms: args.interval_ms,
        history_capacity: args.history_capacity,
    };

    #[cfg(target_os = "linux")]
    let fs = RealFs::new();
    #[cfg(not(target_os = "linux"))]
    let fs = MockFs::new();

    let directory = CgroupDirectory::new(fs.clone(), args.slice_path, args.proc_path);
    let mut engine = MonitorEngine::new(config, fs, directory);

    // Graceful shutdown on Ctrl-C / SIGTERM
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    match engine.on_start() {
        Ok(()) => {}
        Err(e @ EngineError::Channel(_)) => {
            // Sampling continues without IPC rather than exiting silently
            error!("{}", e);
            warn!("running degraded: sampling only, no channel clients");
        }
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Shutting down...");
    engine.on_stop();
    info!("Shutdown complete");
}
