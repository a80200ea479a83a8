//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// testcoord - interleaving coordinator for controller tests
#[derive(Parser)]
#[command(
    name = "tc",
    about = "Coordinator that forces event interleavings in controller tests",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub stderr: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator until interrupted
    Serve {
        /// Test plan (overrides `test-plan` in config)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Socket path (overrides `socket-path` in config)
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Append every evaluated notification to this JSONL file
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Parse a test plan and print its steps
    Validate {
        /// Test plan file
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Check a running coordinator is alive
    Ping {
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Print a running coordinator's scenario status as JSON
    Status {
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("testcoord")
        .join("logs")
        .join("testcoord.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["tc", "--stderr", "serve", "--plan", "plan.yaml", "-s", "/tmp/tc.sock"]).unwrap();
        assert!(cli.stderr);
        match cli.command {
            Command::Serve { plan, socket, history } => {
                assert_eq!(plan, Some(PathBuf::from("plan.yaml")));
                assert_eq!(socket, Some(PathBuf::from("/tmp/tc.sock")));
                assert!(history.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tc", "validate", "plan.yaml", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_log_path_layout() {
        assert!(get_log_path().ends_with("testcoord/logs/testcoord.log"));
    }
}
