//! Recording adapter for the `ProcessRunner` port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{ProcessFuture, ProcessRunner};

/// Records process runs while delegating to an inner implementation.
pub struct RecordingProcessRunner {
    inner: Box<dyn ProcessRunner>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingProcessRunner {
    /// Creates a new recording runner wrapping the given implementation.
    pub fn new(inner: Box<dyn ProcessRunner>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
pub(crate) struct RunInput<'a> {
    pub command: &'a [String],
    pub deadline_ms: u64,
}

impl<'a> RunInput<'a> {
    pub(crate) fn new(command: &'a [String], deadline: Duration) -> Self {
        Self { command, deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX) }
    }
}

impl ProcessRunner for RecordingProcessRunner {
    fn run_bounded<'a>(&'a self, deadline: Duration, command: &'a [String]) -> ProcessFuture<'a> {
        Box::pin(async move {
            let result = self.inner.run_bounded(deadline, command).await;
            let input = RunInput::new(command, deadline);
            record_result(&self.recorder, "process", "run_bounded", &input, result.as_ref());
            result
        })
    }
}
