//! Resolved runtime settings.

use std::time::Duration;

use crate::cli::GlobalArgs;
use crate::mount::MountConfig;
use crate::ports::Endpoint;
use crate::supervisor::SupervisorConfig;

/// Typed view of the global flags, handed to every command handler.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where the fault service listens.
    pub endpoint: Endpoint,
    /// Bound on opening a connection to the service.
    pub connect_timeout: Duration,
    /// Deadline for each supervised command.
    pub command_timeout: Duration,
    /// Mount orchestration settings.
    pub mount: MountConfig,
    /// Supervisor loop tuning.
    pub supervisor: SupervisorConfig,
}

impl Settings {
    /// Resolves settings from parsed global flags.
    #[must_use]
    pub fn from_args(args: &GlobalArgs) -> Self {
        let command_timeout = Duration::from_millis(args.timeout_ms);
        Self {
            endpoint: Endpoint::new(args.host.clone(), args.port),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            command_timeout,
            mount: MountConfig {
                executable: args.executable.clone(),
                command_timeout,
                debug_log: args.debug_fuse.then(|| args.debug_log.clone()),
            },
            supervisor: SupervisorConfig {
                capture_limit: args.capture_limit,
                ..SupervisorConfig::default()
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout: crate::adapters::live::faults::DEFAULT_CONNECT_TIMEOUT,
            command_timeout: crate::mount::DEFAULT_COMMAND_TIMEOUT,
            mount: MountConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn debug_log_only_applies_with_debug_fuse() {
        let plain = Cli::parse_from(["fsfault", "operations"]);
        assert!(Settings::from_args(&plain.global).mount.debug_log.is_none());

        let debug = Cli::parse_from(["fsfault", "--debug-fuse", "--debug-log", "/tmp/x.log", "operations"]);
        let settings = Settings::from_args(&debug.global);
        assert_eq!(settings.mount.debug_log.as_deref(), Some(Path::new("/tmp/x.log")));
    }

    #[test]
    fn flags_flow_into_settings() {
        let cli = Cli::parse_from([
            "fsfault", "--host", "10.0.0.2", "--port", "9191", "--timeout-ms", "250",
            "--capture-limit", "64", "operations",
        ]);
        let settings = Settings::from_args(&cli.global);
        assert_eq!(settings.endpoint.to_string(), "10.0.0.2:9191");
        assert_eq!(settings.command_timeout, Duration::from_millis(250));
        assert_eq!(settings.mount.command_timeout, Duration::from_millis(250));
        assert_eq!(settings.supervisor.capture_limit, 64);
        assert_eq!(settings.supervisor.poll_interval, SupervisorConfig::default().poll_interval);
    }
}
