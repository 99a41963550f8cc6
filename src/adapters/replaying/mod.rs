//! Replaying adapters that serve recorded interactions.

pub mod faults;
pub mod filesystem;
pub mod process;

pub use faults::{ReplayingFaultConnector, ReplayingFaultService};
pub use filesystem::ReplayingFileSystem;
pub use process::ReplayingProcessRunner;

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use crate::cassette::format::RecordableError;
use crate::cassette::replayer::CassetteReplayer;

/// Shared handle to one port's replayer.
pub type SharedReplayer = Arc<Mutex<CassetteReplayer>>;

/// Take the next recorded output for `port`/`method`.
///
/// # Panics
///
/// Panics if the port has no cassette or the cassette is exhausted.
pub(crate) fn next_output(
    replayer: Option<&SharedReplayer>,
    port: &str,
    method: &str,
) -> serde_json::Value {
    let replayer = replayer.unwrap_or_else(|| {
        panic!("no cassette configured for port {port:?} (called {method:?})")
    });
    let mut guard = replayer.lock().expect("replayer lock poisoned");
    guard.next_interaction(port, method).output.clone()
}

/// Rebuild a `Result<T, E>` from an output recorded by `recording::record_result`.
///
/// # Panics
///
/// Panics if the recorded `ok` value does not deserialize as `T`.
pub(crate) fn replay_result<T, E>(output: serde_json::Value) -> Result<T, E>
where
    T: DeserializeOwned,
    E: RecordableError,
{
    if let Some(err) = output.get("err") {
        return Err(E::from_record(err));
    }
    let value = output.get("ok").cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        panic!("recorded output does not match the expected type: {e}")
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;

    use crate::cassette::format::{Cassette, Interaction};
    use crate::cassette::replayer::CassetteReplayer;

    /// Replayer over `(port, method, output)` triples, in order.
    pub(crate) fn replayer(entries: Vec<(&str, &str, serde_json::Value)>) -> CassetteReplayer {
        let interactions = entries
            .into_iter()
            .enumerate()
            .map(|(seq, (port, method, output))| Interaction {
                seq: seq as u64,
                port: port.into(),
                method: method.into(),
                input: serde_json::json!({}),
                output,
            })
            .collect();
        let cassette =
            Cassette { name: "test".into(), recorded_at: Utc::now(), host: "h".into(), interactions };
        CassetteReplayer::new(&cassette)
    }
}
