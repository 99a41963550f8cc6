//! Control plane for a fault-injecting FUSE filesystem.
//!
//! Two pieces do the work: [`supervisor::run_bounded`] runs external commands
//! under a hard deadline while capturing their merged output, and
//! [`fault::FaultInjectionClient`] speaks the service's Thrift control protocol
//! to arm and disarm faults. [`mount::Mounter`] combines the first with the
//! service's executable; the `fsfault` binary exposes all of it.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod fault;
pub mod mount;
pub mod ports;
pub mod supervisor;
pub mod thrift;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}
