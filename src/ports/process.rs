//! Process runner port for bounded execution of external commands.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cassette::format::RecordableError;

/// Boxed future type alias used by [`ProcessRunner`] to keep the trait dyn-compatible.
pub type ProcessFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProcessResult, SupervisorError>> + Send + 'a>>;

/// Outcome of a command that ran to completion before its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,
    /// Combined stdout and stderr, in emission order, up to the capture limit.
    #[serde(with = "text")]
    pub output: Vec<u8>,
    /// Whether output beyond the capture limit was discarded.
    #[serde(default)]
    pub truncated: bool,
}

impl ProcessResult {
    /// Whether the command exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Captured output decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Failures of a bounded run.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The request itself was unusable (empty command, zero deadline).
    #[error("invalid process request: {0}")]
    InvalidRequest(String),
    /// The command could not be started.
    #[error("failed to launch {command:?}: {source}")]
    Launch {
        /// Argument vector that was attempted.
        command: Vec<String>,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
    /// The process was still alive at the deadline and has been killed.
    #[error(
        "{command:?} did not terminate within {deadline:?}; output so far: [{}]",
        String::from_utf8_lossy(.partial_output)
    )]
    Timeout {
        /// Argument vector of the killed process.
        command: Vec<String>,
        /// Deadline that was exceeded.
        deadline: Duration,
        /// Output captured before the kill.
        partial_output: Vec<u8>,
    },
    /// Reading the output stream or polling the process failed.
    #[error("I/O failure while supervising {command:?}: {source}")]
    Io {
        /// Argument vector of the supervised process.
        command: Vec<String>,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl SupervisorError {
    /// Short machine-readable kind, used in cassettes and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Launch { .. } => "launch",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
        }
    }

    /// Whether the failure is a deadline expiry rather than a start or I/O problem.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl RecordableError for SupervisorError {
    fn to_record(&self) -> serde_json::Value {
        let mut record = json!({ "kind": self.kind(), "message": self.to_string() });
        match self {
            Self::Launch { command, source } | Self::Io { command, source } => {
                record["command"] = json!(command);
                record["source"] = json!(source.to_string());
            }
            Self::Timeout { command, deadline, partial_output } => {
                record["command"] = json!(command);
                record["deadline_ms"] = json!(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
                record["output"] = json!(String::from_utf8_lossy(partial_output));
            }
            Self::InvalidRequest(_) => {}
        }
        record
    }

    fn from_record(record: &serde_json::Value) -> Self {
        let message = record["message"].as_str().unwrap_or("unknown error").to_string();
        let source = || io::Error::other(record["source"].as_str().unwrap_or(&message).to_string());
        let command: Vec<String> =
            serde_json::from_value(record["command"].clone()).unwrap_or_default();
        match record["kind"].as_str() {
            Some("timeout") => Self::Timeout {
                command,
                deadline: Duration::from_millis(record["deadline_ms"].as_u64().unwrap_or(0)),
                partial_output: record["output"].as_str().unwrap_or("").as_bytes().to_vec(),
            },
            Some("launch") => Self::Launch { command, source: source() },
            Some("io") => Self::Io { command, source: source() },
            _ => Self::InvalidRequest(message),
        }
    }
}

/// Runs external commands to completion or to a deadline.
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` (argument vector, program first) with stderr merged into
    /// stdout, killing it if it is still alive once `deadline` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Timeout`] (with partial output) when the
    /// deadline expires, [`SupervisorError::Launch`] when the command cannot
    /// start, and [`SupervisorError::Io`] when its output cannot be read.
    fn run_bounded<'a>(&'a self, deadline: Duration, command: &'a [String]) -> ProcessFuture<'a>;
}

/// Serializes captured bytes as text so cassettes stay readable.
mod text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}
