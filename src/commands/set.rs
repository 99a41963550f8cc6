//! `fsfault set` and `fsfault set-all` commands.

use crate::cli::FaultArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::fault::{FaultSpec, InterceptableOperation};

use super::{attach, close_after};

/// Execute the `set` command.
///
/// The rule is validated before the service is contacted.
///
/// # Errors
///
/// Returns an error string for invalid fault arguments, or if the service
/// cannot be reached or rejects the rule.
pub async fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    operations: &[InterceptableOperation],
    fault: &FaultArgs,
) -> Result<(), String> {
    let spec = FaultSpec::new(operations.iter().copied(), fault.to_params().map_err(|e| e.to_string())?);
    spec.validate().map_err(|e| e.to_string())?;

    let mut client = attach(ctx, settings).await?;
    let set = client.set_fault(&spec).await.map_err(|e| e.to_string());
    close_after(client, set).await?;

    println!("Set fault on {}", spec.wire_names().join(", "));
    Ok(())
}

/// Execute the `set-all` command.
///
/// # Errors
///
/// Same as [`run`].
pub async fn run_all(ctx: &ServiceContext, settings: &Settings, fault: &FaultArgs) -> Result<(), String> {
    let params = fault.to_params().map_err(|e| e.to_string())?;

    let mut client = attach(ctx, settings).await?;
    let set = client.set_all_faults(&params).await.map_err(|e| e.to_string());
    close_after(client, set).await?;

    println!("Set fault on all operations");
    Ok(())
}
