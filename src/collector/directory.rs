//! Service directory resolution.
//!
//! Maps OS-managed service names to their backing processes and lifecycle
//! status. The Linux binding enumerates systemd units as cgroup v2
//! directories under `system.slice`; everything goes through the
//! [`FileSystem`] trait so resolution is mockable.
//!
//! All lookups fold errors (unit not found, unreadable files, manager tree
//! missing) into sentinel values — `0` / `Unknown` / empty string. Callers
//! must treat "unresolved" as a normal, frequent outcome.

use crate::collector::traits::FileSystem;
use std::path::Path;

/// Lifecycle status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Paused,
    StartPending,
    StopPending,
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Paused => "Paused",
            ServiceStatus::StartPending => "StartPending",
            ServiceStatus::StopPending => "StopPending",
            ServiceStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only queries against the OS service directory.
pub trait ServiceDirectory: Send + Sync {
    /// Names of currently known active services.
    fn active_services(&self) -> Vec<String>;

    /// Process id backing a service, 0 when none.
    fn process_id(&self, name: &str) -> u32;

    /// Lifecycle status of a service.
    fn status(&self, name: &str) -> ServiceStatus;

    /// Path of the service's executable, empty when unresolved.
    fn executable_path(&self, name: &str) -> String;
}

/// Systemd service directory backed by the cgroup v2 tree.
///
/// A unit `foo.service` appears as `{slice_path}/foo.service/`; its main
/// process is the first entry of `cgroup.procs` and a frozen cgroup
/// (`cgroup.freeze` = 1) maps to [`ServiceStatus::Paused`]. The transitional
/// `StartPending`/`StopPending` states cannot be observed through cgroups
/// and are only produced by other directory implementations.
pub struct CgroupDirectory<F: FileSystem> {
    fs: F,
    slice_path: String,
    proc_path: String,
}

impl<F: FileSystem> CgroupDirectory<F> {
    /// Creates a directory resolver.
    ///
    /// # Arguments
    /// * `slice_path` - cgroup slice holding service units
    ///   (usually "/sys/fs/cgroup/system.slice")
    /// * `proc_path` - base path of the proc filesystem (usually "/proc")
    pub fn new(fs: F, slice_path: impl Into<String>, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            slice_path: slice_path.into(),
            proc_path: proc_path.into(),
        }
    }

    fn unit_file(&self, name: &str, file: &str) -> String {
        format!("{}/{}/{}", self.slice_path, name, file)
    }
}

impl<F: FileSystem> ServiceDirectory for CgroupDirectory<F> {
    fn active_services(&self) -> Vec<String> {
        let entries = match self.fs.read_dir(Path::new(&self.slice_path)) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .filter(|n| n.ends_with(".service"))
            .map(|n| n.to_string())
            .collect();
        names.sort();
        names
    }

    fn process_id(&self, name: &str) -> u32 {
        self.fs
            .read_to_string(Path::new(&self.unit_file(name, "cgroup.procs")))
            .ok()
            .and_then(|content| content.lines().next().and_then(|l| l.trim().parse().ok()))
            .unwrap_or(0)
    }

    fn status(&self, name: &str) -> ServiceStatus {
        let unit_dir = format!("{}/{}", self.slice_path, name);
        if !self.fs.exists(Path::new(&unit_dir)) {
            return ServiceStatus::Unknown;
        }

        if let Ok(freeze) = self
            .fs
            .read_to_string(Path::new(&self.unit_file(name, "cgroup.freeze")))
            && freeze.trim() == "1"
        {
            return ServiceStatus::Paused;
        }

        if self.process_id(name) != 0 {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        }
    }

    fn executable_path(&self, name: &str) -> String {
        let pid = self.process_id(name);
        if pid == 0 {
            return String::new();
        }

        let cmdline_path = format!("{}/{}/cmdline", self.proc_path, pid);
        self.fs
            .read_to_string(Path::new(&cmdline_path))
            .ok()
            .and_then(|content| content.split('\0').next().map(|s| s.to_string()))
            .unwrap_or_default()
    }
}
