//! In-memory mocks for testing without a real `/proc` or cgroup tree.
//!
//! `MockFs` simulates a filesystem in memory. Unlike a plain map it shares
//! its state across clones, so a test can keep a handle and advance file
//! contents (uptime, CPU tick counters) between sampling passes while the
//! sampler owns its own clone.
//!
//! `MockDirectory` is a canned [`ServiceDirectory`] for driving the engine
//! and dispatcher without cgroup fixtures.

use crate::collector::directory::{ServiceDirectory, ServiceStatus};
use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockFsInner {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    inner: Arc<Mutex<MockFsInner>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.lock().unwrap();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                inner.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        inner.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.lock().unwrap();

        inner.directories.insert(path.clone());
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                inner.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Removes a file, simulating a process or unit that disappeared.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.inner.lock().unwrap().files.remove(path.as_ref());
    }

    /// Adds a systemd-style service unit with its backing process files.
    ///
    /// Creates `{slice}/{name}/cgroup.procs` plus `/proc/{pid}/` stat,
    /// status, and cmdline entries. With `pid == 0` the unit exists with an
    /// empty cgroup (a stopped service).
    pub fn add_service(&self, slice: &str, name: &str, pid: u32, utime: u64, stime: u64) {
        if pid == 0 {
            self.add_file(format!("{slice}/{name}/cgroup.procs"), "");
            return;
        }

        self.add_file(format!("{slice}/{name}/cgroup.procs"), format!("{pid}\n"));
        self.add_file(
            format!("/proc/{pid}/stat"),
            format!(
                "{pid} ({name}) S 1 {pid} {pid} 0 -1 4194560 0 0 0 0 \
                 {utime} {stime} 0 0 20 0 1 0 100 0 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
            ),
        );
        self.add_file(
            format!("/proc/{pid}/status"),
            format!("Name:\t{name}\nPid:\t{pid}\nVmRSS:\t10240 kB\n"),
        );
        self.add_file(format!("/proc/{pid}/cmdline"), format!("/usr/sbin/{name}\0"));
    }

    /// A small system: two services sharing one host process, one with its
    /// own process, and one stopped.
    pub fn typical_services(slice: &str) -> Self {
        let fs = Self::new();
        fs.add_file(
            "/proc/stat",
            "cpu  10 0 5 80\ncpu0 5 0 2 40\ncpu1 5 0 3 40\nbtime 1700000000\n",
        );
        fs.add_file("/proc/uptime", "1000.00 1980.00\n");
        fs.add_service(slice, "dbus.service", 300, 100, 50);
        fs.add_service(slice, "gearbox.service", 300, 100, 50);
        fs.add_service(slice, "nginx.service", 1234, 350, 150);
        fs.add_service(slice, "redis.service", 0, 0, 0);
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.files.contains_key(path) || inner.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let inner = self.inner.lock().unwrap();
        if !inner.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{:?}", path),
            ));
        }

        let mut entries: Vec<PathBuf> = inner
            .files
            .keys()
            .chain(inner.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
struct MockUnit {
    pid: u32,
    status: ServiceStatus,
    executable: String,
}

/// Canned service directory for tests.
///
/// Shares state across clones so a test can stop or restart a service while
/// the engine holds its own handle.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    units: Arc<Mutex<HashMap<String, MockUnit>>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a service entry.
    pub fn add(&self, name: &str, pid: u32, status: ServiceStatus, executable: &str) {
        self.units.lock().unwrap().insert(
            name.to_string(),
            MockUnit {
                pid,
                status,
                executable: executable.to_string(),
            },
        );
    }

    /// Re-points a service at a different pid (service restart).
    pub fn set_pid(&self, name: &str, pid: u32) {
        if let Some(unit) = self.units.lock().unwrap().get_mut(name) {
            unit.pid = pid;
        }
    }

    /// Removes a service entirely.
    pub fn remove(&self, name: &str) {
        self.units.lock().unwrap().remove(name);
    }
}

impl ServiceDirectory for MockDirectory {
    fn active_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn process_id(&self, name: &str) -> u32 {
        self.units
            .lock()
            .unwrap()
            .get(name)
            .map(|u| u.pid)
            .unwrap_or(0)
    }

    fn status(&self, name: &str) -> ServiceStatus {
        self.units
            .lock()
            .unwrap()
            .get(name)
            .map(|u| u.status)
            .unwrap_or(ServiceStatus::Unknown)
    }

    fn executable_path(&self, name: &str) -> String {
        self.units
            .lock()
            .unwrap()
            .get(name)
            .map(|u| u.executable.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_shares_state_across_clones() {
        let fs = MockFs::new();
        let clone = fs.clone();
        fs.add_file("/proc/uptime", "1.00 2.00\n");
        assert_eq!(
            clone.read_to_string(Path::new("/proc/uptime")).unwrap(),
            "1.00 2.00\n"
        );
    }

    #[test]
    fn mock_fs_read_dir_lists_children() {
        let fs = MockFs::new();
        fs.add_file("/a/b/file1", "x");
        fs.add_dir("/a/c");
        let entries = fs.read_dir(Path::new("/a")).unwrap();
        assert_eq!(entries, vec![PathBuf::from("/a/b"), PathBuf::from("/a/c")]);
        assert!(fs.read_dir(Path::new("/missing")).is_err());
    }

    #[test]
    fn mock_directory_defaults_to_unresolved() {
        let dir = MockDirectory::new();
        assert_eq!(dir.process_id("ghost.service"), 0);
        assert_eq!(dir.status("ghost.service"), ServiceStatus::Unknown);
        assert_eq!(dir.executable_path("ghost.service"), "");
    }

    #[test]
    fn mock_directory_shares_state_across_clones() {
        let dir = MockDirectory::new();
        let clone = dir.clone();
        dir.add("nginx.service", 42, ServiceStatus::Running, "/usr/sbin/nginx");
        assert_eq!(clone.process_id("nginx.service"), 42);
        clone.set_pid("nginx.service", 43);
        assert_eq!(dir.process_id("nginx.service"), 43);
    }
}
