//! Engine configuration.

use crate::history::DEFAULT_CAPACITY;
use crate::protocol::MIN_INTERVAL_MS;
use std::path::PathBuf;
use tracing::warn;

/// Settings for a [`MonitorEngine`](crate::engine::MonitorEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Well-known address of the local channel.
    pub socket_path: PathBuf,
    /// Base path of the proc filesystem.
    pub proc_path: String,
    /// Cgroup slice holding service units.
    pub slice_path: String,
    /// Initial monitoring interval in milliseconds.
    pub interval_ms: u64,
    /// Retained samples per service.
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/svcwatch.sock"),
            proc_path: "/proc".to_string(),
            slice_path: "/sys/fs/cgroup/system.slice".to_string(),
            interval_ms: 1000,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Returns the config with out-of-range values raised to their floors.
    pub fn normalized(mut self) -> Self {
        if self.interval_ms < MIN_INTERVAL_MS {
            warn!(
                "interval {}ms below floor, using {}ms",
                self.interval_ms, MIN_INTERVAL_MS
            );
            self.interval_ms = MIN_INTERVAL_MS;
        }
        if self.history_capacity == 0 {
            warn!("history capacity 0 is invalid, using 1");
            self.history_capacity = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_enforces_interval_floor() {
        let config = EngineConfig {
            interval_ms: 100,
            history_capacity: 0,
            ..EngineConfig::default()
        }
        .normalized();

        assert_eq!(config.interval_ms, MIN_INTERVAL_MS);
        assert_eq!(config.history_capacity, 1);
    }

    #[test]
    fn normalized_keeps_valid_values() {
        let config = EngineConfig::default().normalized();
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.history_capacity, DEFAULT_CAPACITY);
    }
}
