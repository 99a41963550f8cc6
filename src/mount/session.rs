use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::{command, MountError};
use crate::ports::ProcessRunner;

/// A filesystem mounted by [`Mounter::mount`](super::Mounter::mount).
///
/// Tear it down with [`unmount`](Self::unmount). Dropping a session that is
/// still mounted only logs a warning; the mount stays in place.
pub struct MountSession<'a> {
    runner: &'a dyn ProcessRunner,
    deadline: Duration,
    mount_point: PathBuf,
    data_dir: PathBuf,
    mounted: bool,
}

impl<'a> MountSession<'a> {
    pub(super) fn new(
        runner: &'a dyn ProcessRunner,
        deadline: Duration,
        mount_point: PathBuf,
        data_dir: PathBuf,
    ) -> Self {
        Self { runner, deadline, mount_point, data_dir, mounted: true }
    }

    /// Directory presenting the faulty view.
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Backing directory holding the real data.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Unmounts the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::UnmountFailed`] on a non-zero exit of the unmount
    /// command, or [`MountError::Supervisor`] if it could not be run in time.
    pub async fn unmount(mut self) -> Result<(), MountError> {
        unmount_at(self.runner, self.deadline, &self.mount_point).await?;
        self.mounted = false;
        Ok(())
    }

    /// Leaves the filesystem mounted and forgets about it, returning the mount point.
    #[must_use]
    pub fn detach(mut self) -> PathBuf {
        self.mounted = false;
        std::mem::take(&mut self.mount_point)
    }
}

impl Drop for MountSession<'_> {
    fn drop(&mut self) {
        if self.mounted {
            warn!(mount_point = %self.mount_point.display(), "mount session dropped while still mounted");
        }
    }
}

pub(super) async fn unmount_at(
    runner: &dyn ProcessRunner,
    deadline: Duration,
    mount_point: &Path,
) -> Result<(), MountError> {
    let result = runner.run_bounded(deadline, &command::unmount(mount_point)).await?;
    if !result.success() {
        return Err(MountError::UnmountFailed {
            mount_point: mount_point.to_path_buf(),
            exit_code: result.exit_code,
            output: result.output_lossy(),
        });
    }
    info!(mount_point = %mount_point.display(), "unmounted");
    Ok(())
}
