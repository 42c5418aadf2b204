//! Command dispatcher.
//!
//! Executes one request from the fixed command set against the service
//! directory, the sampler, and the history store, and always produces a
//! well-formed response. Every failure — unknown command, missing
//! parameter, undecodable request, poisoned collaborator — becomes an
//! `error` response; nothing escapes this layer, so a command-level fault
//! can never close or corrupt the channel.

use crate::collector::{FileSystem, ProcessSampler, ServiceDirectory};
use crate::history::HistoryStore;
use crate::protocol::{
    self, MIN_INTERVAL_MS, Request, Response, ServiceHistory, ServiceSnapshot,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Stateless executor for protocol commands.
///
/// The sampler is shared with the sampling loop so live `GET_STATUS`
/// sampling uses the same per-pid CPU accounting as the periodic passes.
pub struct Dispatcher<F: FileSystem, D: ServiceDirectory> {
    directory: Arc<D>,
    sampler: Arc<Mutex<ProcessSampler<F>>>,
    history: Arc<HistoryStore>,
    interval_ms: Arc<AtomicU64>,
}

impl<F: FileSystem, D: ServiceDirectory> Dispatcher<F, D> {
    pub fn new(
        directory: Arc<D>,
        sampler: Arc<Mutex<ProcessSampler<F>>>,
        history: Arc<HistoryStore>,
        interval_ms: Arc<AtomicU64>,
    ) -> Self {
        Self {
            directory,
            sampler,
            history,
            interval_ms,
        }
    }

    /// Decodes one request line, executes it, and encodes the response.
    ///
    /// This is the channel server's entry point; a malformed line yields an
    /// encoded `error` response rather than a transport fault.
    pub fn handle_line(&self, line: &str) -> String {
        let response = match protocol::decode::<Request>(line) {
            Ok(request) => self.dispatch(&request),
            Err(e) => Response::error(format!("Malformed request: {}", e)),
        };

        protocol::encode(&response)
            .unwrap_or_else(|e| format!(r#"{{"error":"response encoding failed: {}"}}"#, e))
    }

    /// Executes one decoded request.
    pub fn dispatch(&self, request: &Request) -> Response {
        debug!("dispatching {}", request.command);
        match request.command.as_str() {
            "PING" => Response::pong(),
            "GET_STATUS" => self.get_status(request),
            "GET_ALL_STATUS" => self.get_all_status(),
            "GET_HISTORY" => self.get_history(),
            "SET_INTERVAL" => self.set_interval(request),
            other => Response::error(format!("Unknown command: {}", other)),
        }
    }

    fn get_status(&self, request: &Request) -> Response {
        let Some(target) = request.target_service.as_deref().filter(|t| !t.is_empty())
        else {
            return Response::error("targetService is required for GET_STATUS");
        };

        let status = self.directory.status(target);
        let pid = self.directory.process_id(target);

        let Ok(mut sampler) = self.sampler.lock() else {
            return Response::error("sampler state unavailable");
        };
        let metrics = sampler.sample(pid);
        drop(sampler);

        Response::Status {
            status: status.as_str().to_string(),
            cpu: metrics.cpu_percent,
            memory_mb: metrics.memory_mb,
            uptime_seconds: metrics.uptime_seconds,
            executable_path: self.directory.executable_path(target),
        }
    }

    fn get_all_status(&self) -> Response {
        let services = self
            .history
            .service_names()
            .into_iter()
            .filter_map(|name| {
                self.history.latest(&name).map(|sample| ServiceSnapshot {
                    name,
                    cpu: sample.cpu_percent,
                    memory_mb: sample.memory_mb,
                })
            })
            .collect();

        Response::AllStatus {
            status: "OK".to_string(),
            services,
        }
    }

    fn get_history(&self) -> Response {
        let services = self
            .history
            .service_names()
            .into_iter()
            .map(|name| {
                let series = self.history.snapshot(&name);
                ServiceHistory {
                    name,
                    cpu: series.iter().map(|s| s.cpu_percent).collect(),
                    memory_mb: series.iter().map(|s| s.memory_mb).collect(),
                }
            })
            .collect();

        Response::History {
            status: "OK".to_string(),
            services,
        }
    }

    fn set_interval(&self, request: &Request) -> Response {
        let Some(interval) = request.interval_ms else {
            return Response::error("intervalMs is required for SET_INTERVAL");
        };

        if interval < MIN_INTERVAL_MS {
            return Response::error(format!("Interval must be >= {}ms", MIN_INTERVAL_MS));
        }

        self.interval_ms.store(interval, Ordering::SeqCst);
        Response::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{MockDirectory, MockFs, ServiceStatus};
    use crate::history::MetricSample;

    fn fixture() -> (Dispatcher<MockFs, MockDirectory>, Arc<AtomicU64>, Arc<HistoryStore>) {
        let fs = MockFs::typical_services("/sys/fs/cgroup/system.slice");
        let directory = MockDirectory::new();
        directory.add("nginx.service", 1234, ServiceStatus::Running, "/usr/sbin/nginx");
        directory.add("redis.service", 0, ServiceStatus::Stopped, "");

        let sampler = Arc::new(Mutex::new(ProcessSampler::new(fs, "/proc")));
        let history = Arc::new(HistoryStore::new(16));
        let interval = Arc::new(AtomicU64::new(1000));

        let dispatcher = Dispatcher::new(
            Arc::new(directory),
            sampler,
            history.clone(),
            interval.clone(),
        );
        (dispatcher, interval, history)
    }

    fn sample(at: i64, cpu: f64, mem: f64) -> MetricSample {
        MetricSample {
            collected_at: at,
            cpu_percent: cpu,
            memory_mb: mem,
        }
    }

    #[test]
    fn ping_pongs() {
        let (dispatcher, _, _) = fixture();
        assert_eq!(dispatcher.dispatch(&Request::ping()), Response::pong());
    }

    #[test]
    fn get_status_samples_live() {
        let (dispatcher, _, _) = fixture();
        match dispatcher.dispatch(&Request::status("nginx.service")) {
            Response::Status {
                status,
                cpu,
                memory_mb,
                executable_path,
                ..
            } => {
                assert_eq!(status, "Running");
                assert_eq!(cpu, 0.0); // first observation of the pid
                assert_eq!(memory_mb, 10.0);
                assert_eq!(executable_path, "/usr/sbin/nginx");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn get_status_unresolved_service_degrades_to_zeros() {
        let (dispatcher, _, _) = fixture();
        match dispatcher.dispatch(&Request::status("redis.service")) {
            Response::Status {
                status,
                cpu,
                memory_mb,
                uptime_seconds,
                ..
            } => {
                assert_eq!(status, "Stopped");
                assert_eq!(cpu, 0.0);
                assert_eq!(memory_mb, 0.0);
                assert_eq!(uptime_seconds, 0);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn get_status_requires_target() {
        let (dispatcher, _, _) = fixture();
        let response = dispatcher.dispatch(&Request {
            command: "GET_STATUS".to_string(),
            target_service: None,
            interval_ms: None,
        });
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn get_all_status_uses_latest_sample() {
        let (dispatcher, _, history) = fixture();
        history.append("nginx.service", sample(1, 10.0, 20.0));
        history.append("nginx.service", sample(2, 30.0, 40.0));

        match dispatcher.dispatch(&Request::all_status()) {
            Response::AllStatus { status, services } => {
                assert_eq!(status, "OK");
                assert_eq!(services.len(), 1);
                assert_eq!(services[0].name, "nginx.service");
                assert_eq!(services[0].cpu, 30.0);
                assert_eq!(services[0].memory_mb, 40.0);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn get_history_returns_full_series() {
        let (dispatcher, _, history) = fixture();
        history.append("nginx.service", sample(1, 10.0, 20.0));
        history.append("nginx.service", sample(2, 30.0, 40.0));

        match dispatcher.dispatch(&Request::history()) {
            Response::History { services, .. } => {
                assert_eq!(services.len(), 1);
                assert_eq!(services[0].cpu, vec![10.0, 30.0]);
                assert_eq!(services[0].memory_mb, vec![20.0, 40.0]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn set_interval_enforces_floor() {
        let (dispatcher, interval, _) = fixture();

        match dispatcher.dispatch(&Request::set_interval(499)) {
            Response::Error { error } => assert_eq!(error, "Interval must be >= 500ms"),
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(interval.load(Ordering::SeqCst), 1000);

        assert_eq!(dispatcher.dispatch(&Request::set_interval(500)), Response::ok());
        assert_eq!(interval.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn unknown_command_is_reported() {
        let (dispatcher, _, _) = fixture();
        let response = dispatcher.dispatch(&Request {
            command: "REBOOT".to_string(),
            target_service: None,
            interval_ms: None,
        });
        match response {
            Response::Error { error } => assert_eq!(error, "Unknown command: REBOOT"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn malformed_line_yields_error_response() {
        let (dispatcher, _, _) = fixture();
        let encoded = dispatcher.handle_line("{this is not json");
        match protocol::decode::<Response>(&encoded).unwrap() {
            Response::Error { error } => assert!(error.starts_with("Malformed request")),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
