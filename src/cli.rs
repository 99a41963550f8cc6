//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::fault::{FaultParams, InterceptableOperation, Probability, SpecError};

/// Top-level CLI parser for `fsfault`.
#[derive(Debug, Parser)]
#[command(
    name = "fsfault",
    version,
    about = "Mount a fault-injecting filesystem and control which calls fail"
)]
pub struct Cli {
    /// Connection and supervision settings shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command. Each falls back to an environment variable.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Host running the fault service.
    #[arg(long, global = true, env = "FSFAULT_HOST", default_value = "localhost")]
    pub host: String,
    /// Control port of the fault service.
    #[arg(long, global = true, env = "FSFAULT_PORT", default_value_t = 9090)]
    pub port: u16,
    /// Fault service executable, a path or a name on PATH.
    #[arg(long, global = true, env = "FSFAULT_EXECUTABLE", default_value = "charybdefs")]
    pub executable: PathBuf,
    /// Run the service in the foreground with FUSE debugging.
    #[arg(long, global = true, env = "FSFAULT_DEBUG_FUSE")]
    pub debug_fuse: bool,
    /// Where the service's debug output goes when --debug-fuse is set.
    #[arg(long, global = true, env = "FSFAULT_DEBUG_LOG", default_value = "fsfault-service.log")]
    pub debug_log: PathBuf,
    /// Deadline for each supervised command, in milliseconds.
    #[arg(
        long,
        global = true,
        env = "FSFAULT_TIMEOUT_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_ms: u64,
    /// Deadline for connecting to the fault service, in milliseconds.
    #[arg(
        long,
        global = true,
        env = "FSFAULT_CONNECT_TIMEOUT_MS",
        default_value_t = 2000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connect_timeout_ms: u64,
    /// Most bytes of command output kept.
    #[arg(long, global = true, env = "FSFAULT_CAPTURE_LIMIT", default_value_t = 1024 * 1024)]
    pub capture_limit: usize,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a command under the bounded supervisor and print its output.
    Exec {
        /// Program and arguments, after `--`.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Start the fault service over a mount point.
    Mount {
        /// Directory presenting the faulty view.
        mount_point: PathBuf,
        /// Directory holding the real data.
        data_dir: PathBuf,
    },
    /// Unmount the fault service.
    Unmount {
        /// Mount point to detach.
        mount_point: PathBuf,
    },
    /// List interceptable operations.
    Operations {
        /// Ask the running service and compare with the local list.
        #[arg(long)]
        remote: bool,
    },
    /// Clear one fault rule, or all of them.
    Clear {
        /// Operation whose rule to clear; all rules when omitted.
        #[arg(long)]
        op: Option<InterceptableOperation>,
    },
    /// Install a fault rule for some operations.
    Set {
        /// Operations the rule applies to.
        #[arg(long = "op", required = true)]
        ops: Vec<InterceptableOperation>,
        /// What the rule does.
        #[command(flatten)]
        fault: FaultArgs,
    },
    /// Install one fault rule for every operation.
    SetAll {
        /// What the rule does.
        #[command(flatten)]
        fault: FaultArgs,
    },
    /// Apply a YAML fault plan.
    Apply {
        /// Plan file.
        plan: PathBuf,
    },
}

/// Fault rule parameters.
#[derive(Debug, Clone, Args)]
pub struct FaultArgs {
    /// OS error code returned when the fault fires.
    #[arg(long = "errno", default_value_t = 5, allow_negative_numbers = true)]
    pub error_number: i32,
    /// Let the service pick a random error code.
    #[arg(long)]
    pub random: bool,
    /// Chance of firing, in parts per 100000 (not a percentage).
    #[arg(long, default_value_t = 100_000, allow_negative_numbers = true)]
    pub probability: i64,
    /// Regular expression over file paths; empty matches all.
    #[arg(long, default_value = "")]
    pub victim: String,
    /// Kill the calling process when the fault fires.
    #[arg(long)]
    pub kill_caller: bool,
    /// Latency added to matching calls, in microseconds.
    #[arg(long = "delay-us", default_value_t = 0)]
    pub delay_micros: u32,
}

impl FaultArgs {
    /// Validated rule parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] for an out-of-range probability or delay.
    pub fn to_params(&self) -> Result<FaultParams, SpecError> {
        let params = FaultParams {
            error_number: self.error_number,
            random: self.random,
            probability: Probability::try_from(self.probability)?,
            victim_pattern: self.victim.clone(),
            kill_caller: self.kill_caller,
            delay_micros: self.delay_micros,
        };
        params.validate()?;
        Ok(params)
    }
}
