//! Bounded-time process supervision.
//!
//! [`run_bounded`] starts a command with stderr merged into stdout, drains the
//! shared pipe without ever blocking on it, and kills the process if it is
//! still alive once the deadline has passed. Each loop iteration samples
//! liveness before draining, so output written just before exit is never
//! mistaken for the last output of a live process.

pub mod capture;

use std::io;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::ports::{ProcessResult, SupervisorError};
use capture::{drain, set_nonblocking, CaptureBuffer};

/// Idle sleep between polls when the process is alive and silent.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Most bytes drained in one iteration before liveness is sampled again.
pub const DEFAULT_CHUNK_LIMIT: usize = 10 * 1024;
/// Size of each individual read.
pub const DEFAULT_READ_SIZE: usize = 1024;
/// Most output kept for the result.
pub const DEFAULT_CAPTURE_LIMIT: usize = 1024 * 1024;

/// Tuning for the supervision loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Idle sleep between polls.
    pub poll_interval: Duration,
    /// Per-iteration drain bound.
    pub chunk_limit: usize,
    /// Size of each individual read.
    pub read_size: usize,
    /// Capacity of the capture buffer.
    pub capture_limit: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            read_size: DEFAULT_READ_SIZE,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }
}

/// Runs `command` until it exits or `deadline` passes, whichever comes first.
///
/// The deadline is measured from process start and is disarmed once the
/// process is seen dead; remaining output is then drained to the end.
///
/// # Errors
///
/// - [`SupervisorError::InvalidRequest`] for an empty command or zero deadline
/// - [`SupervisorError::Launch`] when the command cannot be started
/// - [`SupervisorError::Timeout`] when the process outlived the deadline (it has been killed)
/// - [`SupervisorError::Io`] when polling or reading fails
#[instrument(skip(config))]
pub async fn run_bounded(
    config: &SupervisorConfig,
    deadline: Duration,
    command: &[String],
) -> Result<ProcessResult, SupervisorError> {
    let Some((program, args)) = command.split_first() else {
        return Err(SupervisorError::InvalidRequest("empty command line".into()));
    };
    if deadline.is_zero() {
        return Err(SupervisorError::InvalidRequest("deadline must be positive".into()));
    }
    let launch_err = |source: io::Error| SupervisorError::Launch { command: command.to_vec(), source };
    let io_err = |source: io::Error| SupervisorError::Io { command: command.to_vec(), source };

    let (mut reader, writer) = io::pipe().map_err(launch_err)?;
    let writer_for_stderr = writer.try_clone().map_err(launch_err)?;
    set_nonblocking(&reader).map_err(launch_err)?;

    // The command holds the parent's copies of the write end; dropping it at
    // the end of this block leaves the child as the only writer, so EOF
    // arrives once the child exits.
    let mut child = {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_for_stderr)
            .kill_on_drop(true);
        cmd.spawn().map_err(launch_err)?
    };
    let started = Instant::now();
    debug!(pid = child.id(), "process started");

    let mut capture = CaptureBuffer::new(config.capture_limit);
    let mut buf = vec![0u8; config.read_size.max(1)];
    loop {
        let status = child.try_wait().map_err(io_err)?;
        let drained =
            drain(&mut reader, &mut buf, config.chunk_limit.max(1), &mut capture).map_err(io_err)?;

        match status {
            None if started.elapsed() > deadline => {
                warn!(?command, captured = capture.as_bytes().len(), "deadline exceeded, killing process");
                child.kill().await.map_err(io_err)?;
                let (partial_output, _) = capture.into_parts();
                return Err(SupervisorError::Timeout {
                    command: command.to_vec(),
                    deadline,
                    partial_output,
                });
            }
            None if drained == 0 => sleep(config.poll_interval).await,
            None => {}
            Some(exit) if drained == 0 => {
                let (output, truncated) = capture.into_parts();
                let exit_code = exit.code().unwrap_or(-1);
                debug!(exit_code, bytes = output.len(), truncated, "process finished");
                return Ok(ProcessResult { exit_code, output, truncated });
            }
            Some(_) => {}
        }
    }
}
