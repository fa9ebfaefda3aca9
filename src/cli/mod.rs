//! CLI command handling.
//!
//! Provides subcommands for:
//! - Watching containers and registering proxy hosts (`run`, the default)
//! - A single reconciliation pass (`sweep`)
//! - Showing what a pass would create without calling the API (`plan`)

mod commands;
mod signal;

pub use commands::{format_plan, run_plan_command, run_service_command, run_sweep_command};
pub use signal::shutdown_signal;

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "npm-autoproxy")]
#[command(about = "Register orchestrated application containers with Nginx Proxy Manager")]
#[command(
    long_about = "Watches Docker for containers of ix- compose projects and creates one proxy host per application.\nExamples:\n  npm-autoproxy run  # Sweep, then follow container starts\n  npm-autoproxy plan  # Show what would be created"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Load environment variables from this file instead of `.env`
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Sweep all applications, then reconcile on container starts (default)
    #[command(
        about = "Sweep and watch",
        long_about = "Creates proxy hosts for every running application, then follows container start events until interrupted.\nExample: npm-autoproxy run"
    )]
    Run,

    /// Reconcile every running application once and exit
    #[command(
        about = "Reconcile once",
        long_about = "Runs the startup sweep and exits. The exit status is non-zero if any application failed.\nExample: npm-autoproxy sweep"
    )]
    Sweep,

    /// Show the proxy hosts a sweep would create, without calling the API
    #[command(
        about = "Dry run",
        long_about = "Lists every application with its selected container, scheme and port. Needs no proxy-manager credential.\nExample: npm-autoproxy plan"
    )]
    Plan,
}

impl Cli {
    /// The subcommand to run, `run` when none was given.
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_version() {
        let cmd = Cli::command();
        assert_eq!(
            cmd.get_version().unwrap_or("unknown"),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default() {
        let cli = Cli::try_parse_from(["npm-autoproxy"]).unwrap();
        assert_eq!(cli.selected_command(), Command::Run);

        let cli = Cli::try_parse_from(["npm-autoproxy", "plan", "--env-file", "/tmp/x.env"]).unwrap();
        assert_eq!(cli.selected_command(), Command::Plan);
        assert_eq!(cli.env_file, Some(PathBuf::from("/tmp/x.env")));
    }

    #[test]
    fn help_lists_every_subcommand() {
        let help = Cli::command().render_help().to_string();
        for name in ["run", "sweep", "plan"] {
            assert!(help.contains(name), "help should mention {name}");
        }
    }
}
