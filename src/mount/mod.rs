//! Mount orchestration around the fault-injecting filesystem service.
//!
//! The service binds a fixed control port and does not refuse to start twice,
//! so a second instance mounts fine but cannot be controlled. [`Mounter::mount`]
//! therefore kills any running instance before starting a new one.

pub mod command;
mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::ports::{FileSystem, ProcessRunner, SupervisorError};
pub use session::MountSession;

/// Default service executable, looked up on `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "charybdefs";

/// Default deadline for each mount-related command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Failures at the mount boundary.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The service did not come up over the mount point.
    #[error("mount of {} over {} failed: {reason}", .mount_point.display(), .data_dir.display())]
    MountFailed {
        /// Requested mount point.
        mount_point: PathBuf,
        /// Requested backing directory.
        data_dir: PathBuf,
        /// Exit status and output, or the precondition that failed.
        reason: String,
    },
    /// The unmount command exited non-zero.
    #[error("unmount of {} failed with exit code {exit_code}: {output}", .mount_point.display())]
    UnmountFailed {
        /// Mount point that stayed mounted.
        mount_point: PathBuf,
        /// Exit code of the unmount command.
        exit_code: i32,
        /// Captured output of the unmount command.
        output: String,
    },
    /// A mount-related command could not be run to completion.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// Preparing the mount point failed.
    #[error("{}: {message}", .path.display())]
    Filesystem {
        /// Path being prepared.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },
}

/// How the service is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Service executable, a path or a name looked up on `PATH`.
    pub executable: PathBuf,
    /// Deadline applied to every command.
    pub command_timeout: Duration,
    /// When set, run the service with FUSE debugging and send its output here.
    pub debug_log: Option<PathBuf>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            debug_log: None,
        }
    }
}

/// Starts and stops the service over a mount point.
pub struct Mounter<'a> {
    process: &'a dyn ProcessRunner,
    fs: &'a dyn FileSystem,
    config: MountConfig,
}

impl<'a> Mounter<'a> {
    /// Creates a mounter using the given ports.
    pub fn new(process: &'a dyn ProcessRunner, fs: &'a dyn FileSystem, config: MountConfig) -> Self {
        Self { process, fs, config }
    }

    /// Kills running service instances if any are mounted. Returns whether any were found.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Supervisor`] if `findmnt` or `killall` cannot be run in time.
    #[instrument(skip(self))]
    pub async fn kill_stale_instances(&self) -> Result<bool, MountError> {
        let name = command::executable_name(&self.config.executable);
        let found = self.run(&command::find_mounts(&name)).await?;
        if !found.success() || !found.output_lossy().contains(&name) {
            debug!(%name, "no stale instances");
            return Ok(false);
        }

        warn!(%name, "stale instance mounted, killing all instances");
        let killed = self.run(&command::kill_all(&name)).await?;
        if !killed.success() {
            // Instances can exit between findmnt and killall.
            warn!(%name, exit_code = killed.exit_code, output = %killed.output_lossy(), "killall reported failure");
        }
        Ok(true)
    }

    /// Mounts the service over `mount_point`, backed by `data_dir`.
    ///
    /// Creates `mount_point` if missing; it must be empty otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::MountFailed`] when the mount point is not empty or the
    /// service exits non-zero, [`MountError::Filesystem`] when the mount point
    /// cannot be prepared, and [`MountError::Supervisor`] when a command cannot be
    /// run in time.
    #[instrument(skip(self))]
    pub async fn mount(&self, mount_point: &Path, data_dir: &Path) -> Result<MountSession<'a>, MountError> {
        let mount_point = absolute(mount_point)?;
        let data_dir = absolute(data_dir)?;
        let failed = |reason: String| MountError::MountFailed {
            mount_point: mount_point.clone(),
            data_dir: data_dir.clone(),
            reason,
        };

        self.kill_stale_instances().await?;
        self.prepare_mount_point(&mount_point).map_err(|err| match err {
            PrepareError::NotEmpty(entries) => {
                failed(format!("mount point is not empty ({entries} entries)"))
            }
            PrepareError::Io(message) => MountError::Filesystem { path: mount_point.clone(), message },
        })?;

        let argv = match &self.config.debug_log {
            Some(log) => command::mount_debug(&self.config.executable, &mount_point, &data_dir, &absolute(log)?),
            None => command::mount(&self.config.executable, &mount_point, &data_dir),
        };
        let result = self.run(&argv).await?;
        if !result.success() {
            return Err(failed(format!("exit code {}: {}", result.exit_code, result.output_lossy())));
        }

        info!(mount_point = %mount_point.display(), data_dir = %data_dir.display(), "mounted");
        Ok(MountSession::new(self.process, self.config.command_timeout, mount_point, data_dir))
    }

    /// Unmounts whatever is mounted at `mount_point`.
    ///
    /// # Errors
    ///
    /// Same as [`MountSession::unmount`].
    pub async fn unmount(&self, mount_point: &Path) -> Result<(), MountError> {
        session::unmount_at(self.process, self.config.command_timeout, &absolute(mount_point)?).await
    }

    async fn run(&self, argv: &[String]) -> Result<crate::ports::ProcessResult, SupervisorError> {
        self.process.run_bounded(self.config.command_timeout, argv).await
    }

    fn prepare_mount_point(&self, mount_point: &Path) -> Result<(), PrepareError> {
        if !self.fs.exists(mount_point) {
            return self.fs.create_dir_all(mount_point).map_err(|e| PrepareError::Io(e.to_string()));
        }
        let entries = self.fs.list_dir(mount_point).map_err(|e| PrepareError::Io(e.to_string()))?;
        if entries.is_empty() {
            Ok(())
        } else {
            Err(PrepareError::NotEmpty(entries.len()))
        }
    }
}

enum PrepareError {
    NotEmpty(usize),
    Io(String),
}

fn absolute(path: &Path) -> Result<PathBuf, MountError> {
    std::path::absolute(path)
        .map_err(|e| MountError::Filesystem { path: path.to_path_buf(), message: e.to_string() })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::adapters::live::LiveFileSystem;
    use crate::ports::{ProcessFuture, ProcessResult};

    /// Returns scripted results and remembers every command it was asked to run.
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        results: Mutex<VecDeque<Result<ProcessResult, SupervisorError>>>,
    }

    impl ScriptedRunner {
        fn then(self, exit_code: i32, output: &str) -> Self {
            let result = ProcessResult { exit_code, output: output.as_bytes().to_vec(), truncated: false };
            self.results.lock().unwrap().push_back(Ok(result));
            self
        }

        fn then_err(self, err: SupervisorError) -> Self {
            self.results.lock().unwrap().push_back(Err(err));
            self
        }

        fn programs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|argv| argv[0].clone()).collect()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run_bounded<'a>(&'a self, _deadline: Duration, command: &'a [String]) -> ProcessFuture<'a> {
            self.calls.lock().unwrap().push(command.to_vec());
            let next = self.results.lock().unwrap().pop_front().expect("unexpected command");
            Box::pin(async move { next })
        }
    }

    struct TempDirs {
        root: PathBuf,
    }

    impl TempDirs {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(name);
            let _ = std::fs::remove_dir_all(&root);
            std::fs::create_dir_all(root.join("data")).unwrap();
            Self { root }
        }
    }

    impl Drop for TempDirs {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    #[tokio::test]
    async fn mounts_into_a_fresh_directory_and_unmounts() {
        let dirs = TempDirs::new("fsfault_mount_fresh_test");
        let runner = ScriptedRunner::default().then(1, "").then(0, "").then(0, "");
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        let mount_point = dirs.root.join("mnt");
        let session = mounter.mount(&mount_point, &dirs.root.join("data")).await.unwrap();
        assert!(mount_point.is_dir());
        assert_eq!(session.mount_point(), mount_point);
        session.unmount().await.unwrap();

        assert_eq!(runner.programs(), vec!["findmnt", "charybdefs", "fusermount"]);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[1][2], format!("-omodules=subdir,subdir={}", dirs.root.join("data").display()));
    }

    #[tokio::test]
    async fn kills_stale_instances_before_mounting() {
        let dirs = TempDirs::new("fsfault_mount_stale_test");
        let runner = ScriptedRunner::default()
            .then(0, "TARGET SOURCE FSTYPE\n/mnt/old charybdefs fuse.charybdefs rw\n")
            .then(0, "")
            .then(0, "");
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        let session = mounter.mount(&dirs.root.join("mnt"), &dirs.root.join("data")).await.unwrap();
        let _ = session.detach();
        assert_eq!(runner.programs(), vec!["findmnt", "killall", "charybdefs"]);
    }

    #[tokio::test]
    async fn refuses_a_non_empty_mount_point() {
        let dirs = TempDirs::new("fsfault_mount_busy_test");
        std::fs::create_dir_all(dirs.root.join("mnt")).unwrap();
        std::fs::write(dirs.root.join("mnt/leftover"), "x").unwrap();
        let runner = ScriptedRunner::default().then(1, "");
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        let err = mounter.mount(&dirs.root.join("mnt"), &dirs.root.join("data")).await.err().unwrap();
        assert!(matches!(err, MountError::MountFailed { .. }));
        assert!(err.to_string().contains("not empty"));
        assert_eq!(runner.programs(), vec!["findmnt"]);
    }

    #[tokio::test]
    async fn non_zero_service_exit_is_a_mount_failure() {
        let dirs = TempDirs::new("fsfault_mount_fail_test");
        let runner = ScriptedRunner::default().then(1, "").then(1, "fuse: device not found");
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        let err = mounter.mount(&dirs.root.join("mnt"), &dirs.root.join("data")).await.err().unwrap();
        let message = err.to_string();
        assert!(message.contains("exit code 1"));
        assert!(message.contains("fuse: device not found"));
    }

    #[tokio::test]
    async fn service_timeout_surfaces_as_supervisor_error() {
        let dirs = TempDirs::new("fsfault_mount_timeout_test");
        let runner = ScriptedRunner::default().then(1, "").then_err(SupervisorError::Timeout {
            command: vec!["charybdefs".into()],
            deadline: DEFAULT_COMMAND_TIMEOUT,
            partial_output: Vec::new(),
        });
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        let err = mounter.mount(&dirs.root.join("mnt"), &dirs.root.join("data")).await.err().unwrap();
        assert!(matches!(err, MountError::Supervisor(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn debug_mode_detaches_through_the_shell() {
        let dirs = TempDirs::new("fsfault_mount_debug_test");
        let runner = ScriptedRunner::default().then(1, "").then(0, "");
        let fs = LiveFileSystem;
        let config = MountConfig { debug_log: Some(dirs.root.join("service.log")), ..MountConfig::default() };
        let mounter = Mounter::new(&runner, &fs, config);

        let session = mounter.mount(&dirs.root.join("mnt"), &dirs.root.join("data")).await.unwrap();
        let _ = session.detach();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[1][0], "sh");
        assert!(calls[1][2].contains(" -f -d "));
        assert!(calls[1][2].contains("service.log"));
    }

    #[tokio::test]
    async fn failed_unmount_reports_exit_code_and_output() {
        let runner = ScriptedRunner::default().then(1, "fusermount: entry for /mnt/x not found in /etc/mtab");
        let fs = LiveFileSystem;
        let mounter = Mounter::new(&runner, &fs, MountConfig::default());

        match mounter.unmount(Path::new("/mnt/x")).await {
            Err(MountError::UnmountFailed { exit_code, output, .. }) => {
                assert_eq!(exit_code, 1);
                assert!(output.contains("not found"));
            }
            other => panic!("expected unmount failure, got {other:?}"),
        }
    }
}
