//! Live process runner backed by the bounded supervisor.

use std::time::Duration;

use crate::ports::process::{ProcessFuture, ProcessRunner};
use crate::supervisor::{run_bounded, SupervisorConfig};

/// Runs real child processes under [`run_bounded`].
#[derive(Debug, Clone, Default)]
pub struct LiveProcessRunner {
    config: SupervisorConfig,
}

impl LiveProcessRunner {
    /// Creates a runner with the given loop tuning.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }
}

impl ProcessRunner for LiveProcessRunner {
    fn run_bounded<'a>(&'a self, deadline: Duration, command: &'a [String]) -> ProcessFuture<'a> {
        Box::pin(run_bounded(&self.config, deadline, command))
    }
}
