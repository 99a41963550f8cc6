//! Command dispatch and handlers.

pub mod apply;
pub mod clear;
pub mod exec;
pub mod mount;
pub mod operations;
pub mod set;
pub mod unmount;

use std::env;
use std::path::{Path, PathBuf};

use crate::cassette::session::RecordingSession;
use crate::cli::{Cli, Command};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::fault::FaultInjectionClient;

/// Dispatch a parsed command to its handler.
///
/// When `FSFAULT_RECORD` is set to a directory path, all port interactions are
/// recorded to per-port cassette files in a new directory under it. When
/// `FSFAULT_REPLAY` names a recorded session directory, every port is served
/// from its cassettes instead.
///
/// # Errors
///
/// Returns an error string if the runtime cannot start or the selected
/// command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let settings = Settings::from_args(&cli.global);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    let (ctx, session) = if let Ok(path) = env::var("FSFAULT_RECORD") {
        let (ctx, session) = ServiceContext::recording_at(PathBuf::from(path), &settings)?;
        (ctx, Some(session))
    } else if let Ok(path) = env::var("FSFAULT_REPLAY") {
        (ServiceContext::replaying(Path::new(&path))?, None)
    } else {
        (ServiceContext::live(&settings), None)
    };

    let result = runtime.block_on(dispatch_with_context(&cli.command, &ctx, &settings));

    // Finish recording after command completes (even on error)
    if let Some(session) = session {
        // Drop context first to release Arc references
        drop(ctx);
        finish_recording(session)?;
    }

    result
}

/// Dispatch a command with the given service context.
async fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    settings: &Settings,
) -> Result<(), String> {
    match command {
        Command::Exec { argv } => exec::run(ctx, settings, argv).await,
        Command::Mount { mount_point, data_dir } => {
            mount::run(ctx, settings, mount_point, data_dir).await
        }
        Command::Unmount { mount_point } => unmount::run(ctx, settings, mount_point).await,
        Command::Operations { remote } => operations::run(ctx, settings, *remote).await,
        Command::Clear { op } => clear::run(ctx, settings, *op).await,
        Command::Set { ops, fault } => set::run(ctx, settings, ops, fault).await,
        Command::SetAll { fault } => set::run_all(ctx, settings, fault).await,
        Command::Apply { plan } => apply::run(ctx, settings, plan).await,
    }
}

/// Opens a client without clearing the rules earlier invocations installed.
async fn attach(ctx: &ServiceContext, settings: &Settings) -> Result<FaultInjectionClient, String> {
    FaultInjectionClient::attach(ctx.faults.as_ref(), settings.endpoint.clone())
        .await
        .map_err(|e| format!("Failed to connect to fault service at {}: {e}", settings.endpoint))
}

/// Closes `client`, then returns `result`. The call's own error wins over a close error.
async fn close_after<T>(
    mut client: FaultInjectionClient,
    result: Result<T, String>,
) -> Result<T, String> {
    let closed = client
        .close()
        .await
        .map_err(|e| format!("Failed to close connection to {}: {e}", client.endpoint()));
    let value = result?;
    closed?;
    Ok(value)
}

/// Finish a recording session and print the output directory.
fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let output_dir = session.finish()?;
    eprintln!("Recording saved to: {}", output_dir.display());
    Ok(())
}
