//! `fsfault mount` command.

use std::path::Path;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::mount::Mounter;

/// Execute the `mount` command.
///
/// The service keeps running after this returns; `fsfault unmount` stops it.
///
/// # Errors
///
/// Returns an error string if the mount point cannot be prepared or the
/// service fails to start.
pub async fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    mount_point: &Path,
    data_dir: &Path,
) -> Result<(), String> {
    let mounter = Mounter::new(ctx.process.as_ref(), ctx.fs.as_ref(), settings.mount.clone());
    let session = mounter.mount(mount_point, data_dir).await.map_err(|e| e.to_string())?;
    println!("Mounted {} over {}", session.data_dir().display(), session.mount_point().display());
    let _ = session.detach();
    Ok(())
}
