//! CLI module for MediCore.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::config::ExecutorKind;
use clap::{Parser, Subcommand};

/// The request `medicore run` sends when none is given.
pub const EXAMPLE_QUERY: &str = "A 65-year-old female has creatinine 1.2. Calculate her GFR and suggest hypertension protocol.";

/// MediCore - Clinical Decision Support Agent
///
/// A tool-calling LLM agent that computes renal function, looks up treatment
/// protocols and runs Python in a secure sandbox.
#[derive(Parser, Debug)]
#[command(name = "medicore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "MEDICORE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent once and print its answer
    Run {
        /// Clinical request (defaults to a built-in example)
        query: Option<String>,

        /// Model / deployment id to use
        #[arg(short, long)]
        model: Option<String>,

        /// Code executor (e2b or local)
        #[arg(short, long)]
        executor: Option<ExecutorKind>,
    },

    /// Serve the web form
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Code executor (e2b or local)
        #[arg(short, long)]
        executor: Option<ExecutorKind>,
    },

    /// Verify dependencies, project files and environment configuration
    Verify,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_without_query() {
        let cli = Cli::parse_from(["medicore", "run"]);
        match cli.command {
            Commands::Run {
                query,
                model,
                executor,
            } => {
                assert!(query.is_none());
                assert!(model.is_none());
                assert!(executor.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_serve_with_globals() {
        let cli = Cli::parse_from(["medicore", "-vv", "serve", "--port", "9000", "-c", "x.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(9000),
                executor: None,
            }
        ));
    }

    #[test]
    fn test_parse_executor_override() {
        let cli = Cli::parse_from(["medicore", "run", "65F creatinine 1.2", "--executor", "local"]);
        assert!(matches!(
            cli.command,
            Commands::Run {
                executor: Some(ExecutorKind::Local),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["medicore", "serve", "-e", "docker"]).is_err());
    }

    #[test]
    fn test_verify_takes_no_arguments() {
        assert!(Cli::try_parse_from(["medicore", "verify"]).is_ok());
        assert!(Cli::try_parse_from(["medicore", "verify", "extra"]).is_err());
    }
}
