//! Monitoring engine: lifecycle, the periodic sampling loop, and wiring
//! between the directory resolver, sampler, history store, and channel
//! server.
//!
//! The engine owns two background tasks — the sampling loop and the channel
//! server's accept/serve loop — and guarantees that a stop call signals
//! both, abandons any pending sleep/accept/read, and joins both threads
//! before returning, so no orphaned activity survives.

use crate::collector::{FileSystem, ProcessSampler, ServiceDirectory};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::history::{HistoryStore, MetricSample};
use crate::server::{ChannelServer, RequestHandler, ServerError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Granularity of the interruptible sleep between sampling passes.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Error type for engine startup failures.
#[derive(Debug)]
pub enum EngineError {
    /// The channel socket could not be created. The sampling loop keeps
    /// running; the caller decides whether a channel-less degraded run is
    /// acceptable.
    Channel(ServerError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Channel(e) => write!(f, "channel unavailable: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ServerError> for EngineError {
    fn from(e: ServerError) -> Self {
        EngineError::Channel(e)
    }
}

/// Lifecycle contract driven by the external host adapter.
///
/// Implemented by the engine and called by composition — the host wrapper
/// forwards the service manager's control signals to these hooks.
pub trait ServiceLifecycle {
    fn on_start(&mut self) -> Result<(), EngineError>;
    fn on_stop(&mut self);
    fn on_pause(&mut self) {}
    fn on_continue(&mut self) {}
}

/// The monitoring engine.
pub struct MonitorEngine<F: FileSystem + 'static, D: ServiceDirectory + 'static> {
    directory: Arc<D>,
    sampler: Arc<Mutex<ProcessSampler<F>>>,
    history: Arc<HistoryStore>,
    interval_ms: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    sampler_thread: Option<JoinHandle<()>>,
    server: ChannelServer,
}

impl<F: FileSystem + 'static, D: ServiceDirectory + 'static> MonitorEngine<F, D> {
    /// Creates an engine from a (normalized) configuration, a filesystem for
    /// the sampler, and a service directory resolver.
    pub fn new(config: EngineConfig, fs: F, directory: D) -> Self {
        let config = config.normalized();
        Self {
            directory: Arc::new(directory),
            sampler: Arc::new(Mutex::new(ProcessSampler::new(fs, config.proc_path.clone()))),
            history: Arc::new(HistoryStore::new(config.history_capacity)),
            interval_ms: Arc::new(AtomicU64::new(config.interval_ms)),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            sampler_thread: None,
            server: ChannelServer::new(config.socket_path),
        }
    }

    pub fn history(&self) -> Arc<HistoryStore> {
        self.history.clone()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn request_handler(&self) -> Arc<RequestHandler> {
        let dispatcher = Dispatcher::new(
            self.directory.clone(),
            self.sampler.clone(),
            self.history.clone(),
            self.interval_ms.clone(),
        );
        Arc::new(move |line: &str| dispatcher.handle_line(line))
    }

    fn spawn_sampling_loop(&mut self) {
        let directory = self.directory.clone();
        let sampler = self.sampler.clone();
        let history = self.history.clone();
        let interval_ms = self.interval_ms.clone();
        let running = self.running.clone();
        let paused = self.paused.clone();

        self.sampler_thread = Some(std::thread::spawn(move || {
            let mut pass_count: u64 = 0;
            while running.load(Ordering::SeqCst) {
                if !paused.load(Ordering::SeqCst) {
                    run_sampling_pass(directory.as_ref(), &sampler, &history);
                    pass_count += 1;
                    if pass_count.is_multiple_of(60) {
                        debug!(
                            "pass #{}: {} services retained",
                            pass_count,
                            history.service_names().len()
                        );
                    }
                }

                // Interval is re-read every iteration so SET_INTERVAL takes
                // effect within one cycle without a restart
                let interval = Duration::from_millis(interval_ms.load(Ordering::SeqCst));
                interruptible_sleep(&running, interval);
            }
            debug!("sampling loop exited after {} passes", pass_count);
        }));
    }
}

impl<F: FileSystem + 'static, D: ServiceDirectory + 'static> ServiceLifecycle
    for MonitorEngine<F, D>
{
    /// Starts the sampling loop and the channel server.
    ///
    /// If the channel socket cannot be created the sampling loop is left
    /// running and the fault is surfaced; the caller may accept the
    /// degraded (channel-less) mode or call `on_stop`.
    fn on_start(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }

        info!("monitor engine starting");
        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.spawn_sampling_loop();

        let handler = self.request_handler();
        if let Err(e) = self.server.start(handler) {
            error!("channel server failed to start: {}", e);
            return Err(e.into());
        }

        info!("monitor engine started");
        Ok(())
    }

    fn on_stop(&mut self) {
        if !self.is_running() {
            return;
        }

        info!("monitor engine stopping");
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.sampler_thread.take()
            && handle.join().is_err()
        {
            error!("sampling thread panicked");
        }
        self.server.stop();
        info!("monitor engine stopped");
    }

    fn on_pause(&mut self) {
        info!("monitor engine paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    fn on_continue(&mut self) {
        info!("monitor engine resumed");
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl<F: FileSystem + 'static, D: ServiceDirectory + 'static> Drop for MonitorEngine<F, D> {
    fn drop(&mut self) {
        self.on_stop();
    }
}

/// Executes one sampling pass: resolve services, deduplicate shared
/// processes, sample each distinct process once, and fan the samples out to
/// every service's history entry.
///
/// Services that resolve to no process are skipped (not recorded). Services
/// sharing one process id receive the identical sample for the pass, so
/// sampling cost is bounded by the number of distinct processes.
pub fn run_sampling_pass<F: FileSystem, D: ServiceDirectory + ?Sized>(
    directory: &D,
    sampler: &Mutex<ProcessSampler<F>>,
    history: &HistoryStore,
) {
    let mut resolved: Vec<(String, u32)> = Vec::new();
    let mut observed: HashSet<u32> = HashSet::new();

    for name in directory.active_services() {
        let pid = directory.process_id(&name);
        if pid == 0 {
            continue;
        }
        observed.insert(pid);
        resolved.push((name, pid));
    }

    let samples: std::collections::HashMap<u32, MetricSample> = {
        let Ok(mut sampler) = sampler.lock() else {
            error!("sampler state unavailable, skipping pass");
            return;
        };

        let collected_at = Utc::now().timestamp();
        let samples = observed
            .iter()
            .map(|&pid| {
                let metrics = sampler.sample(pid);
                (
                    pid,
                    MetricSample {
                        collected_at,
                        cpu_percent: metrics.cpu_percent,
                        memory_mb: metrics.memory_mb,
                    },
                )
            })
            .collect();

        // Reclaim accounting for pids that vanished since the last pass
        sampler.retain(&observed);
        samples
    };

    for (name, pid) in &resolved {
        if let Some(sample) = samples.get(pid) {
            history.append(name, *sample);
        }
    }

    debug!(
        "sampling pass: {} services, {} distinct processes",
        resolved.len(),
        observed.len()
    );
}

fn interruptible_sleep(running: &AtomicBool, duration: Duration) {
    let mut remaining = duration;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
