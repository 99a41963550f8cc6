//! Live adapters for real external interactions.

pub mod faults;
pub mod filesystem;
pub mod process;

pub use faults::{ThriftConnector, ThriftFaultService};
pub use filesystem::LiveFileSystem;
pub use process::LiveProcessRunner;
