use std::io;

use serde_json::json;

use super::spec::SpecError;
use crate::cassette::format::RecordableError;
use crate::thrift::ThriftError;

/// Failures of the fault-injection client.
#[derive(Debug, thiserror::Error)]
pub enum FaultError {
    /// Connection-level I/O error (refused, reset, timed out).
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
    /// Malformed or unexpected response from the service.
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// The client was closed before the call.
    #[error("connection is closed")]
    ConnectionClosed,
    /// The request was rejected locally before any network I/O.
    #[error("invalid fault rule: {0}")]
    InvalidSpec(#[from] SpecError),
}

impl FaultError {
    /// Short machine-readable kind, used in cassettes and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::ConnectionClosed => "closed",
            Self::InvalidSpec(_) => "invalid_spec",
        }
    }
}

impl From<ThriftError> for FaultError {
    fn from(err: ThriftError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl RecordableError for FaultError {
    fn to_record(&self) -> serde_json::Value {
        let detail = match self {
            Self::Transport(err) => err.to_string(),
            Self::Protocol(message) => message.clone(),
            Self::ConnectionClosed => String::new(),
            Self::InvalidSpec(err) => err.to_string(),
        };
        json!({ "kind": self.kind(), "detail": detail })
    }

    fn from_record(record: &serde_json::Value) -> Self {
        let detail = record["detail"].as_str().unwrap_or_default().to_string();
        match record["kind"].as_str() {
            Some("transport") => Self::Transport(io::Error::other(detail)),
            Some("closed") => Self::ConnectionClosed,
            // Rule validation errors are raised before any port call, so they never reach a cassette.
            _ => Self::Protocol(detail),
        }
    }
}
