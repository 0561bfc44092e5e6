//! cli
//!
//! Command-line interface layer for rentledger.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, resolves a
//! [`Context`] from flags and config, and dispatches to [`commands`]. All
//! ledger state changes go through [`crate::engine`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context as _, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::ui::output::Verbosity;

/// Execution context for commands.
///
/// Global settings derived from CLI flags and the loaded config.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Debug output enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Resolved configuration.
    pub config: Config,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    // Flag beats --debug beats config.
    let level = match (&cli.log_level, cli.debug) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => config.log_level().to_string(),
    };
    init_tracing(&level);

    let ctx = Context {
        debug: cli.debug,
        quiet: cli.quiet,
        config,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install a stderr `fmt` subscriber filtered by `level`.
///
/// An unparsable filter falls back to `warn`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore a second initialization; the first subscriber stays.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
