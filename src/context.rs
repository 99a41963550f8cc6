//! Service context bundling all port trait objects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::live::{LiveFileSystem, LiveProcessRunner, ThriftConnector};
use crate::adapters::recording::{RecordingFaultConnector, RecordingFileSystem, RecordingProcessRunner};
use crate::adapters::replaying::{ReplayingFaultConnector, ReplayingFileSystem, ReplayingProcessRunner};
use crate::cassette::config::CassetteConfig;
use crate::cassette::session::RecordingSession;
use crate::config::Settings;
use crate::ports::{FaultConnector, FileSystem, ProcessRunner};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, replaying, recording).
pub struct ServiceContext {
    /// Runs child processes under a deadline.
    pub process: Box<dyn ProcessRunner>,
    /// Opens connections to the fault service.
    pub faults: Box<dyn FaultConnector>,
    /// Filesystem for reading plans and preparing mount points.
    pub fs: Box<dyn FileSystem>,
}

impl ServiceContext {
    /// Creates a live context with real adapters.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        Self {
            process: Box::new(LiveProcessRunner::new(settings.supervisor.clone())),
            faults: Box::new(ThriftConnector::new(settings.connect_timeout)),
            fs: Box::new(LiveFileSystem),
        }
    }

    /// Creates a recording context that wraps live adapters.
    ///
    /// Interactions go to per-port cassettes in a timestamped directory under
    /// `root`. Drop the context, then call [`RecordingSession::finish`] to
    /// write them out.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be created.
    pub fn recording_at(
        root: PathBuf,
        settings: &Settings,
    ) -> Result<(Self, RecordingSession), String> {
        let session = RecordingSession::new_in(&root)?;
        let live = Self::live(settings);
        let ctx = Self {
            process: Box::new(RecordingProcessRunner::new(live.process, Arc::clone(&session.process))),
            faults: Box::new(RecordingFaultConnector::new(live.faults, Arc::clone(&session.faults))),
            fs: Box::new(RecordingFileSystem::new(live.fs, Arc::clone(&session.fs))),
        };
        Ok((ctx, session))
    }

    /// Creates a replaying context from per-port cassette files.
    ///
    /// Ports without a configured cassette file use an adapter that panics
    /// with a clear message when called.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        let replayers = config.load_all()?;
        Ok(Self {
            process: Box::new(
                replayers.process.map_or_else(ReplayingProcessRunner::unconfigured, ReplayingProcessRunner::new),
            ),
            faults: Box::new(
                replayers.faults.map_or_else(ReplayingFaultConnector::unconfigured, ReplayingFaultConnector::new),
            ),
            fs: Box::new(replayers.fs.map_or_else(ReplayingFileSystem::unconfigured, ReplayingFileSystem::new)),
        })
    }

    /// Creates a replaying context from a directory written by a recording session.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is missing or a cassette in it cannot be parsed.
    pub fn replaying(dir: &Path) -> Result<Self, String> {
        if !dir.is_dir() {
            return Err(format!("Cassette directory not found: {}", dir.display()));
        }
        Self::replaying_from(&CassetteConfig::from_session_dir(dir))
    }
}
