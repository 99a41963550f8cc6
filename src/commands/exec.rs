//! `fsfault exec` command.

use crate::config::Settings;
use crate::context::ServiceContext;

/// Execute the `exec` command.
///
/// Runs `argv` under the bounded supervisor and prints whatever it wrote to
/// stdout and stderr.
///
/// # Errors
///
/// Returns an error string if the command cannot be started, exits non-zero,
/// or outlives the deadline.
pub async fn run(ctx: &ServiceContext, settings: &Settings, argv: &[String]) -> Result<(), String> {
    let result = ctx
        .process
        .run_bounded(settings.command_timeout, argv)
        .await
        .map_err(|e| e.to_string())?;

    print!("{}", result.output_lossy());
    if result.truncated {
        eprintln!("warning: output truncated to {} bytes", result.output.len());
    }
    if result.success() {
        Ok(())
    } else {
        Err(format!("{argv:?} exited with code {}", result.exit_code))
    }
}
