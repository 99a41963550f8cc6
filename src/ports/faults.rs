//! Fault service port: the RPC channel to the fault-injecting filesystem.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::fault::error::FaultError;
use crate::fault::spec::FaultParams;

/// Boxed future type alias used by the fault ports to keep them dyn-compatible.
pub type FaultFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FaultError>> + Send + 'a>>;

/// Default control port of the fault service.
pub const DEFAULT_PORT: u16 = 9090;

/// Network address of the fault service's control port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One open request/response channel to the fault service.
///
/// Methods mirror the service's remote procedures one to one. The channel has
/// no request multiplexing, so it takes `&mut self` and must not be shared
/// between concurrent callers.
pub trait FaultService: Send {
    /// Names of the operations the service can intercept.
    fn get_methods(&mut self) -> FaultFuture<'_, Vec<String>>;

    /// Removes every active fault rule.
    fn clear_all_faults(&mut self) -> FaultFuture<'_, ()>;

    /// Removes the fault rule attached to one operation.
    fn clear_fault<'a>(&'a mut self, method: &'a str) -> FaultFuture<'a, ()>;

    /// Installs a rule for the named operations.
    fn set_fault<'a>(
        &'a mut self,
        methods: &'a [String],
        params: &'a FaultParams,
    ) -> FaultFuture<'a, ()>;

    /// Installs one rule for every operation.
    fn set_all_fault<'a>(&'a mut self, params: &'a FaultParams) -> FaultFuture<'a, ()>;

    /// Releases the underlying connection.
    fn close(&mut self) -> FaultFuture<'_, ()>;
}

/// Opens channels to the fault service.
pub trait FaultConnector: Send + Sync {
    /// Connects to the service at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::Transport`] when the connection cannot be established.
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> FaultFuture<'a, Box<dyn FaultService>>;
}
