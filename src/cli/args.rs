//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of searching
//! - `--log-level <filter>`: Log filter directive (overrides config)
//! - `--debug`: Debug logging and debug output
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rentledger - replay rental scenarios against the rental ledger
#[derive(Parser, Debug)]
#[command(name = "rl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default search path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. "info" or "rentledger=debug"
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a scenario file against a fresh ledger
    #[command(
        name = "replay",
        long_about = "Replay a TOML scenario against a fresh in-memory ledger.\n\n\
            The scenario declares customers, items, loans that already exist, and a \
            list of steps (check_out, return, reserve, cancel_reservation, fee, show, \
            status). Each step is applied in order and its outcome printed. Steps the \
            ledger refuses are reported as rejected and the replay continues.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Replay and print every step
    rl replay scenario.toml

    # Fail with a non-zero exit code if any step is rejected
    rl replay scenario.toml --strict

    # Append CHECKOUT/RETURN protocol lines to a file
    rl replay scenario.toml --protocol protocol.jsonl

    # Watch the ledger work
    rl replay scenario.toml --log-level rentledger=debug"
    )]
    Replay {
        /// Scenario file to replay
        scenario: PathBuf,

        /// Append protocol entries to this file (overrides config)
        #[arg(long, value_name = "PATH", conflicts_with = "no_protocol")]
        protocol: Option<PathBuf>,

        /// Discard protocol entries (overrides config)
        #[arg(long)]
        no_protocol: bool,

        /// Exit with an error if any step is rejected
        #[arg(long)]
        strict: bool,
    },

    /// Show or initialize configuration
    #[command(
        name = "config",
        long_about = "Show or initialize the rentledger configuration.\n\n\
            Configuration is read from $RENTLEDGER_CONFIG, then \
            $XDG_CONFIG_HOME/rentledger/config.toml, then ~/.rentledger/config.toml.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Show the resolved configuration
    rl config show

    # Print which file would be used
    rl config path

    # Write a config file with default values
    rl config init"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    rl completion bash >> ~/.bashrc

    # Zsh
    rl completion zsh > ~/.zfunc/_rl

    # Fish
    rl completion fish > ~/.config/fish/completions/rl.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show resolved configuration values
    Show,
    /// Print the path of the config file in use
    Path,
    /// Write a config file with default values
    Init {
        /// Write here instead of ~/.rentledger/config.toml
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_flags() {
        let cli = Cli::try_parse_from(["rl", "replay", "s.toml", "--strict", "-q"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Command::Replay {
                scenario, strict, ..
            } => {
                assert_eq!(scenario, PathBuf::from("s.toml"));
                assert!(strict);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn protocol_flags_conflict() {
        let result = Cli::try_parse_from([
            "rl",
            "replay",
            "s.toml",
            "--protocol",
            "p.jsonl",
            "--no-protocol",
        ]);
        assert!(result.is_err());
    }
}
