//! Bounded per-service time series of metric samples.
//!
//! One writer (the sampling loop) appends; any number of readers (request
//! handlers) take consistent snapshots under a shared read lock. Capacity is
//! enforced with FIFO ring semantics: appending at capacity evicts the
//! oldest sample, so an entry never exceeds the configured bound.
//!
//! Entries are created lazily on first observation of a service name and
//! never deleted while the process runs — a stale service's last-known
//! history remains queryable.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Default retained samples per service (~2 hours at 1 Hz).
pub const DEFAULT_CAPACITY: usize = 7200;

/// One observation of a service's resource usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    /// UTC epoch seconds of the sampling pass that produced this sample.
    pub collected_at: i64,
    /// CPU usage in [0, 100].
    pub cpu_percent: f64,
    /// Resident memory in megabytes.
    pub memory_mb: f64,
}

/// Thread-safe mapping from service name to its bounded sample series.
pub struct HistoryStore {
    entries: RwLock<HashMap<String, VecDeque<MetricSample>>>,
    capacity: usize,
}

impl HistoryStore {
    /// Creates a store retaining up to `capacity` samples per service.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the per-service capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a sample to a service's series, evicting the oldest sample
    /// when at capacity.
    pub fn append(&self, service: &str, sample: MetricSample) {
        let mut entries = self.entries.write().unwrap();
        let series = entries.entry(service.to_string()).or_default();
        while series.len() >= self.capacity {
            series.pop_front();
        }
        series.push_back(sample);
    }

    /// Most recent sample for a service, if any.
    pub fn latest(&self, service: &str) -> Option<MetricSample> {
        self.entries
            .read()
            .unwrap()
            .get(service)
            .and_then(|series| series.back().copied())
    }

    /// Full retained series for a service, oldest first.
    pub fn snapshot(&self, service: &str) -> Vec<MetricSample> {
        self.entries
            .read()
            .unwrap()
            .get(service)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Names of all services with at least one retained sample, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of retained samples for a service.
    pub fn len(&self, service: &str) -> usize {
        self.entries
            .read()
            .unwrap()
            .get(service)
            .map(|series| series.len())
            .unwrap_or(0)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(at: i64, cpu: f64) -> MetricSample {
        MetricSample {
            collected_at: at,
            cpu_percent: cpu,
            memory_mb: 1.0,
        }
    }

    #[test]
    fn append_and_read_back() {
        let store = HistoryStore::new(8);
        assert_eq!(store.latest("a"), None);
        assert!(store.snapshot("a").is_empty());

        store.append("a", sample(1, 10.0));
        store.append("a", sample(2, 20.0));

        assert_eq!(store.latest("a"), Some(sample(2, 20.0)));
        assert_eq!(store.snapshot("a"), vec![sample(1, 10.0), sample(2, 20.0)]);
        assert_eq!(store.service_names(), vec!["a"]);
    }

    #[test]
    fn ring_eviction_law() {
        let store = HistoryStore::new(5);
        for i in 0..12 {
            store.append("svc", sample(i, i as f64));
            assert!(store.len("svc") <= 5);
        }

        // After N or more appends the length is exactly N, oldest evicted
        assert_eq!(store.len("svc"), 5);
        let series = store.snapshot("svc");
        assert_eq!(series.first().unwrap().collected_at, 7);
        assert_eq!(series.last().unwrap().collected_at, 11);
    }

    #[test]
    fn entries_survive_service_disappearance() {
        let store = HistoryStore::new(4);
        store.append("gone.service", sample(1, 5.0));
        // Nothing ever deletes the entry; last-known history stays queryable
        assert_eq!(store.latest("gone.service"), Some(sample(1, 5.0)));
    }

    #[test]
    fn concurrent_readers_see_consistent_entries() {
        let store = Arc::new(HistoryStore::new(64));
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    store.append("svc", sample(i, i as f64));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let series = store.snapshot("svc");
                        assert!(series.len() <= 64);
                        // Samples are whole: collected_at always matches cpu
                        for s in &series {
                            assert_eq!(s.collected_at as f64, s.cpu_percent);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
