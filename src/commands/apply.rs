//! `fsfault apply` command.

use std::path::Path;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::fault::FaultPlan;

use super::{attach, close_after};

/// Execute the `apply` command.
///
/// The plan is read and validated in full before the service is contacted.
///
/// # Errors
///
/// Returns an error string if the plan is unreadable or invalid, or names the
/// rule the service failed on.
pub async fn run(ctx: &ServiceContext, settings: &Settings, path: &Path) -> Result<(), String> {
    let plan = FaultPlan::load(ctx.fs.as_ref(), path).map_err(|e| e.to_string())?;

    let mut client = attach(ctx, settings).await?;
    let applied = plan.apply(&mut client).await.map_err(|e| e.to_string());
    let applied = close_after(client, applied).await?;

    println!("Applied {applied} rule(s) from {}", path.display());
    Ok(())
}
