//! Per-process metric sampler reading `/proc/[pid]/`.
//!
//! CPU percentages are computed from deltas between consecutive observations
//! of the same process id, so the sampler keeps a small accounting map keyed
//! by pid. Entries for processes that vanish are reclaimed with [`retain`]
//! after every sampling pass.
//!
//! [`retain`]: ProcessSampler::retain

use crate::collector::parser::{count_cpus, parse_proc_stat, parse_uptime, parse_vm_rss_kb};
use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Clock ticks per second (USER_HZ). Standard value for Linux.
const CLK_TCK: u64 = 100;

/// Instantaneous metrics for one process.
///
/// All-zero values represent "no running process behind this id" — a normal,
/// frequent outcome when services stop and start.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessMetrics {
    /// CPU usage since the previous observation of this pid, in [0, 100].
    pub cpu_percent: f64,
    /// Resident set size in megabytes.
    pub memory_mb: f64,
    /// Wall-clock seconds since the process started.
    pub uptime_seconds: u64,
}

/// CPU accounting state for one process id.
#[derive(Debug, Clone, Copy)]
struct CpuAccounting {
    /// Seconds since boot at the last observation.
    last_wall: f64,
    /// User-mode ticks at the last observation.
    last_utime: u64,
    /// Kernel-mode ticks at the last observation.
    last_stime: u64,
}

/// Samples CPU, memory, and uptime for individual processes.
pub struct ProcessSampler<F: FileSystem> {
    fs: F,
    proc_path: String,
    num_cpus: usize,
    accounting: HashMap<u32, CpuAccounting>,
}

impl<F: FileSystem> ProcessSampler<F> {
    /// Creates a new sampler.
    ///
    /// The logical processor count is detected once from `{proc_path}/stat`;
    /// if that fails, 1 is assumed.
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        let proc_path = proc_path.into();
        let num_cpus = fs
            .read_to_string(Path::new(&format!("{}/stat", proc_path)))
            .map(|content| count_cpus(&content))
            .unwrap_or(1);

        Self {
            fs,
            proc_path,
            num_cpus,
            accounting: HashMap::new(),
        }
    }

    /// Returns the detected logical processor count.
    pub fn num_cpus(&self) -> usize {
        self.num_cpus
    }

    /// Returns the number of pids currently tracked by CPU accounting.
    pub fn tracked_pids(&self) -> usize {
        self.accounting.len()
    }

    /// Samples instantaneous metrics for `pid`.
    ///
    /// `pid == 0` is a defined no-op returning all-zero metrics. A process
    /// that exits between resolution and sampling also degrades to zeros —
    /// transient-process races are expected, not exceptional.
    ///
    /// The first observation of a pid seeds the accounting state and reports
    /// 0% CPU; later observations report the usage since the previous call
    /// for the same pid, clamped to [0, 100].
    pub fn sample(&mut self, pid: u32) -> ProcessMetrics {
        if pid == 0 {
            return ProcessMetrics::default();
        }

        let wall = match self
            .fs
            .read_to_string(Path::new(&format!("{}/uptime", self.proc_path)))
            .ok()
            .and_then(|content| parse_uptime(&content).ok())
        {
            Some(wall) => wall,
            None => {
                debug!("cannot read uptime, degrading pid {} to zeros", pid);
                return ProcessMetrics::default();
            }
        };

        let stat_path = format!("{}/{}/stat", self.proc_path, pid);
        let stat = match self
            .fs
            .read_to_string(Path::new(&stat_path))
            .ok()
            .and_then(|content| parse_proc_stat(&content).ok())
        {
            Some(stat) => stat,
            None => {
                // Process exited between resolution and sampling
                debug!("process {} gone, reporting zero metrics", pid);
                self.accounting.remove(&pid);
                return ProcessMetrics::default();
            }
        };

        let status_path = format!("{}/{}/status", self.proc_path, pid);
        let rss_kb = self
            .fs
            .read_to_string(Path::new(&status_path))
            .map(|content| parse_vm_rss_kb(&content))
            .unwrap_or(0);

        let uptime_seconds = (wall - stat.starttime as f64 / CLK_TCK as f64).max(0.0) as u64;

        ProcessMetrics {
            cpu_percent: self.cpu_percent(pid, wall, stat.utime, stat.stime),
            memory_mb: rss_kb as f64 / 1024.0,
            uptime_seconds,
        }
    }

    /// Evicts accounting state for pids not in `observed`.
    ///
    /// Called after every sampling pass so the map stays bounded by the set
    /// of live processes instead of growing as pids churn.
    pub fn retain(&mut self, observed: &HashSet<u32>) {
        self.accounting.retain(|pid, _| observed.contains(pid));
    }

    fn cpu_percent(&mut self, pid: u32, wall: f64, utime: u64, stime: u64) -> f64 {
        let state = CpuAccounting {
            last_wall: wall,
            last_utime: utime,
            last_stime: stime,
        };

        let Some(prev) = self.accounting.insert(pid, state) else {
            // First observation: no prior delta exists
            return 0.0;
        };

        let wall_delta = wall - prev.last_wall;
        if wall_delta <= 0.0 {
            return 0.0;
        }

        // Counter regression (pid reuse, stat reset) saturates to zero
        let ticks_delta =
            (utime + stime).saturating_sub(prev.last_utime + prev.last_stime);
        let cpu_seconds = ticks_delta as f64 / CLK_TCK as f64;

        // Shared host processes can overshoot slightly due to timing skew
        (100.0 * cpu_seconds / wall_delta / self.num_cpus as f64).clamp(0.0, 100.0)
    }
}
