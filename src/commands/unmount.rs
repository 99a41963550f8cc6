//! `fsfault unmount` command.

use std::path::Path;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::mount::Mounter;

/// Execute the `unmount` command.
///
/// # Errors
///
/// Returns an error string if `fusermount -u` fails or does not finish in time.
pub async fn run(ctx: &ServiceContext, settings: &Settings, mount_point: &Path) -> Result<(), String> {
    let mounter = Mounter::new(ctx.process.as_ref(), ctx.fs.as_ref(), settings.mount.clone());
    mounter.unmount(mount_point).await.map_err(|e| e.to_string())?;
    println!("Unmounted {}", mount_point.display());
    Ok(())
}
