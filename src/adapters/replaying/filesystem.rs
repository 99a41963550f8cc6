//! Replaying adapter for the `FileSystem` port.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{next_output, replay_result, SharedReplayer};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::filesystem::FileSystem;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Replays recorded filesystem interactions from a cassette.
pub struct ReplayingFileSystem {
    replayer: Option<SharedReplayer>,
}

impl ReplayingFileSystem {
    /// Creates a new replaying filesystem from a cassette replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Some(Arc::new(Mutex::new(replayer))) }
    }

    /// Creates a filesystem with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }

    fn next(&self, method: &str) -> serde_json::Value {
        next_output(self.replayer.as_ref(), "fs", method)
    }
}

impl FileSystem for ReplayingFileSystem {
    fn read_to_string(&self, _path: &Path) -> Result<String, BoxError> {
        replay_result(self.next("read_to_string"))
    }

    fn create_dir_all(&self, _path: &Path) -> Result<(), BoxError> {
        replay_result(self.next("create_dir_all"))
    }

    fn exists(&self, _path: &Path) -> bool {
        self.next("exists").as_bool().unwrap_or(false)
    }

    fn list_dir(&self, _path: &Path) -> Result<Vec<String>, BoxError> {
        replay_result(self.next("list_dir"))
    }
}
