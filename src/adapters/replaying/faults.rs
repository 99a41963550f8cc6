//! Replaying adapters for the fault service ports.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result, SharedReplayer};
use crate::cassette::replayer::CassetteReplayer;
use crate::fault::error::FaultError;
use crate::fault::spec::FaultParams;
use crate::ports::{Endpoint, FaultConnector, FaultFuture, FaultService};

const PORT: &str = "faults";

/// Replays recorded connection attempts; every opened channel reads from the
/// same cassette.
pub struct ReplayingFaultConnector {
    replayer: Option<SharedReplayer>,
}

impl ReplayingFaultConnector {
    /// Creates a new replaying connector from a cassette replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Some(Arc::new(Mutex::new(replayer))) }
    }

    /// Creates a connector with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }
}

impl FaultConnector for ReplayingFaultConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Endpoint) -> FaultFuture<'a, Box<dyn FaultService>> {
        let output = next_output(self.replayer.as_ref(), PORT, "connect");
        let replayer = self.replayer.clone();
        Box::pin(async move {
            replay_result::<(), FaultError>(output)?;
            Ok(Box::new(ReplayingFaultService { replayer }) as Box<dyn FaultService>)
        })
    }
}

/// Replays the calls of one recorded fault service channel.
pub struct ReplayingFaultService {
    replayer: Option<SharedReplayer>,
}

impl ReplayingFaultService {
    fn replay<T>(&self, method: &str) -> FaultFuture<'static, T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let output = next_output(self.replayer.as_ref(), PORT, method);
        Box::pin(async move { replay_result(output) })
    }
}

impl FaultService for ReplayingFaultService {
    fn get_methods(&mut self) -> FaultFuture<'_, Vec<String>> {
        self.replay("get_methods")
    }

    fn clear_all_faults(&mut self) -> FaultFuture<'_, ()> {
        self.replay("clear_all_faults")
    }

    fn clear_fault<'a>(&'a mut self, _method: &'a str) -> FaultFuture<'a, ()> {
        self.replay("clear_fault")
    }

    fn set_fault<'a>(
        &'a mut self,
        _methods: &'a [String],
        _params: &'a FaultParams,
    ) -> FaultFuture<'a, ()> {
        self.replay("set_fault")
    }

    fn set_all_fault<'a>(&'a mut self, _params: &'a FaultParams) -> FaultFuture<'a, ()> {
        self.replay("set_all_fault")
    }

    fn close(&mut self) -> FaultFuture<'_, ()> {
        self.replay("close")
    }
}
