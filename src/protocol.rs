//! Request/response wire types for the local channel.
//!
//! The protocol is newline-delimited UTF-8 JSON over a Unix domain stream
//! socket: one line carries one request, one line carries one response.
//! Field names are camelCase on the wire (`targetService`, `memoryMB`, ...).
//!
//! Any response may carry a single `error` string in place of its success
//! fields; the session continues after an error response.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Minimum accepted monitoring interval in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 500;

/// A protocol request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

impl Request {
    fn bare(command: &str) -> Self {
        Self {
            command: command.to_string(),
            target_service: None,
            interval_ms: None,
        }
    }

    pub fn ping() -> Self {
        Self::bare("PING")
    }

    pub fn status(service: &str) -> Self {
        Self {
            target_service: Some(service.to_string()),
            ..Self::bare("GET_STATUS")
        }
    }

    pub fn all_status() -> Self {
        Self::bare("GET_ALL_STATUS")
    }

    pub fn history() -> Self {
        Self::bare("GET_HISTORY")
    }

    pub fn set_interval(interval_ms: u64) -> Self {
        Self {
            interval_ms: Some(interval_ms),
            ..Self::bare("SET_INTERVAL")
        }
    }
}

/// Latest sample for one service, as returned by `GET_ALL_STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub cpu: f64,
    #[serde(rename = "memoryMB")]
    pub memory_mb: f64,
}

/// Full retained series for one service, as returned by `GET_HISTORY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHistory {
    pub name: String,
    pub cpu: Vec<f64>,
    #[serde(rename = "memoryMB")]
    pub memory_mb: Vec<f64>,
}

/// A protocol response. Shape depends on the command; serialized untagged so
/// the wire carries flat objects.
///
/// Decode order matters for untagged deserialization: `History` is tried
/// before `AllStatus` because their `services` arrays are only
/// distinguishable by element shape (an empty list parses as `History`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        status: String,
        cpu: f64,
        #[serde(rename = "memoryMB")]
        memory_mb: f64,
        uptime_seconds: u64,
        executable_path: String,
    },
    History {
        status: String,
        services: Vec<ServiceHistory>,
    },
    AllStatus {
        status: String,
        services: Vec<ServiceSnapshot>,
    },
    Ack {
        status: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    pub fn ok() -> Self {
        Response::Ack {
            status: "OK".to_string(),
        }
    }

    pub fn pong() -> Self {
        Response::Ack {
            status: "PONG".to_string(),
        }
    }
}

/// Encodes a protocol message as a single JSON line (without the trailing
/// newline — framing is the transport's concern).
pub fn encode<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Decodes a protocol message from one JSON line.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_field_names() {
        let line = encode(&Request::set_interval(750)).unwrap();
        assert!(line.contains("\"intervalMs\":750"));
        assert!(!line.contains("interval_ms"));

        let line = encode(&Request::status("nginx.service")).unwrap();
        assert!(line.contains("\"targetService\":\"nginx.service\""));
    }

    #[test]
    fn request_optional_fields_default() {
        let req: Request = decode(r#"{"command":"PING"}"#).unwrap();
        assert_eq!(req, Request::ping());
    }

    #[test]
    fn request_rejects_non_json() {
        assert!(decode::<Request>("not json at all").is_err());
        assert!(decode::<Request>(r#"{"intervalMs":100}"#).is_err());
    }

    #[test]
    fn status_response_wire_shape() {
        let resp = Response::Status {
            status: "Running".to_string(),
            cpu: 12.5,
            memory_mb: 48.0,
            uptime_seconds: 3600,
            executable_path: "/usr/sbin/nginx".to_string(),
        };
        let line = encode(&resp).unwrap();
        assert!(line.contains("\"memoryMB\":48.0"));
        assert!(line.contains("\"uptimeSeconds\":3600"));
        assert!(line.contains("\"executablePath\":\"/usr/sbin/nginx\""));

        assert_eq!(decode::<Response>(&line).unwrap(), resp);
    }

    #[test]
    fn error_response_decodes_as_error() {
        let line = encode(&Response::error("Unknown command: FOO")).unwrap();
        match decode::<Response>(&line).unwrap() {
            Response::Error { error } => assert_eq!(error, "Unknown command: FOO"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn all_status_and_history_disambiguate_by_element_shape() {
        let all = Response::AllStatus {
            status: "OK".to_string(),
            services: vec![ServiceSnapshot {
                name: "nginx.service".to_string(),
                cpu: 1.0,
                memory_mb: 2.0,
            }],
        };
        let hist = Response::History {
            status: "OK".to_string(),
            services: vec![ServiceHistory {
                name: "nginx.service".to_string(),
                cpu: vec![1.0, 2.0],
                memory_mb: vec![2.0, 3.0],
            }],
        };

        assert_eq!(decode::<Response>(&encode(&all).unwrap()).unwrap(), all);
        assert_eq!(decode::<Response>(&encode(&hist).unwrap()).unwrap(), hist);
    }

    #[test]
    fn ack_decodes_last() {
        match decode::<Response>(r#"{"status":"PONG"}"#).unwrap() {
            Response::Ack { status } => assert_eq!(status, "PONG"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
