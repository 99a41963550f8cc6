//! `fsfault clear` command.

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::fault::InterceptableOperation;

use super::{attach, close_after};

/// Execute the `clear` command.
///
/// Clears the rule for `operation`, or every rule when it is `None`.
///
/// # Errors
///
/// Returns an error string if the service cannot be reached or rejects the call.
pub async fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    operation: Option<InterceptableOperation>,
) -> Result<(), String> {
    let mut client = attach(ctx, settings).await?;
    let cleared = match operation {
        Some(op) => client.clear_fault(op).await,
        None => client.clear_all_faults().await,
    }
    .map_err(|e| e.to_string());
    close_after(client, cleared).await?;

    match operation {
        Some(op) => println!("Cleared fault on {op}"),
        None => println!("Cleared all faults"),
    }
    Ok(())
}
