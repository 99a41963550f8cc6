//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the control plane and an
//! external system (child processes, the fault service, the host
//! filesystem). Implementations live in `src/adapters/`.

pub mod faults;
pub mod filesystem;
pub mod process;

pub use faults::{Endpoint, FaultConnector, FaultFuture, FaultService};
pub use filesystem::FileSystem;
pub use process::{ProcessFuture, ProcessResult, ProcessRunner, SupervisorError};
