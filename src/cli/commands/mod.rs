//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to do the work
//! 3. Formats and displays output through [`crate::ui::output`]

mod completion;
mod config_cmd;
mod replay;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use config_cmd::{init as config_init, path as config_path, show as config_show};
pub use replay::replay;

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Replay {
            scenario,
            protocol,
            no_protocol,
            strict,
        } => replay::replay(ctx, &scenario, protocol.as_deref(), no_protocol, strict),
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx),
            ConfigAction::Path => config_cmd::path(ctx),
            ConfigAction::Init { path, force } => config_cmd::init(ctx, path.as_deref(), force),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
