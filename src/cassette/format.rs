//! Cassette data structures for recording and replaying interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded interaction with an external port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (e.g. "process", "faults", "fs").
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Input data sent to the port.
    pub input: serde_json::Value,
    /// Output data returned from the port.
    pub output: serde_json::Value,
}

/// A cassette containing a sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Host the session ran on.
    pub host: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

/// Port errors that survive a trip through a cassette.
///
/// Recorded `Err` outputs are stored as `{"err": <record>}`; replay rebuilds
/// an error of the same kind from the record.
pub trait RecordableError: Sized {
    /// Encodes the error for the cassette.
    fn to_record(&self) -> serde_json::Value;
    /// Rebuilds an error from a cassette record.
    fn from_record(record: &serde_json::Value) -> Self;
}

impl RecordableError for Box<dyn std::error::Error + Send + Sync> {
    fn to_record(&self) -> serde_json::Value {
        serde_json::Value::String(self.to_string())
    }

    fn from_record(record: &serde_json::Value) -> Self {
        record.as_str().unwrap_or("unknown error").to_string().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_cassette() -> Cassette {
        Cassette {
            name: "test-cassette".into(),
            recorded_at: Utc::now(),
            host: "ci-runner".into(),
            interactions: vec![
                Interaction {
                    seq: 0,
                    port: "process".into(),
                    method: "run_bounded".into(),
                    input: json!({"command": ["findmnt", "charybdefs"], "deadline_ms": 1000}),
                    output: json!({"ok": {"exit_code": 1, "output": "", "truncated": false}}),
                },
                Interaction {
                    seq: 1,
                    port: "faults".into(),
                    method: "clear_all_faults".into(),
                    input: json!({}),
                    output: json!({"ok": null}),
                },
            ],
        }
    }

    #[test]
    fn yaml_round_trip() {
        let cassette = sample_cassette();
        let yaml = serde_yaml::to_string(&cassette).expect("serialize");
        let deserialized: Cassette = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(cassette, deserialized);
    }

    #[test]
    fn boxed_errors_keep_their_message() {
        let err: Box<dyn std::error::Error + Send + Sync> = "disk on fire".into();
        let back = <Box<dyn std::error::Error + Send + Sync>>::from_record(&err.to_record());
        assert_eq!(back.to_string(), "disk on fire");
    }
}
