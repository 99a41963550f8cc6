//! Replaying adapter for the `ProcessRunner` port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{next_output, replay_result, SharedReplayer};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::process::{ProcessFuture, ProcessResult, ProcessRunner, SupervisorError};

/// Replays recorded process runs from a cassette.
pub struct ReplayingProcessRunner {
    replayer: Option<SharedReplayer>,
}

impl ReplayingProcessRunner {
    /// Creates a new replaying runner from a cassette replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Some(Arc::new(Mutex::new(replayer))) }
    }

    /// Creates a runner with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }
}

impl ProcessRunner for ReplayingProcessRunner {
    fn run_bounded<'a>(&'a self, _deadline: Duration, _command: &'a [String]) -> ProcessFuture<'a> {
        let output = next_output(self.replayer.as_ref(), "process", "run_bounded");
        Box::pin(async move { replay_result::<ProcessResult, SupervisorError>(output) })
    }
}
