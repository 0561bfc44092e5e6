//! config command - Show or initialize configuration

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::{
    Config, FileConfig, LedgerDefaults, ProtocolConfig, ProtocolSinkKind,
};
use crate::core::item::Item;
use crate::ui::output;

/// Print the resolved configuration.
pub fn show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let verbosity = ctx.verbosity();

    match config.loaded_from() {
        Some(path) => output::print(format!("# Loaded from {}", path.display()), verbosity),
        None => output::print("# No config file found; using defaults", verbosity),
    }

    println!("log_level = {}", config.log_level());
    match config.protocol_sink() {
        ProtocolSinkKind::Log => println!("protocol.sink = log"),
        ProtocolSinkKind::None => println!("protocol.sink = none"),
        ProtocolSinkKind::File(path) => {
            println!("protocol.sink = file");
            println!("protocol.path = {}", path.display());
        }
    }
    let rate = config.default_daily_rate();
    println!("ledger.default_daily_rate = {} ({rate})", rate.minor());

    Ok(())
}

/// Print the path of the config file in use, or where one would be written.
pub fn path(ctx: &Context) -> Result<()> {
    match ctx.config.loaded_from() {
        Some(path) => println!("{}", path.display()),
        None => {
            let path = Config::default_path()?;
            println!("{}", path.display());
            output::print("(file does not exist)", ctx.verbosity());
        }
    }
    Ok(())
}

/// Write a config file spelling out every default.
pub fn init(ctx: &Context, path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    if target.exists() && !force {
        bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            target.display()
        );
    }

    let file = FileConfig {
        log_level: Some("warn".to_string()),
        protocol: Some(ProtocolConfig {
            sink: Some("log".to_string()),
            path: None,
        }),
        ledger: Some(LedgerDefaults {
            default_daily_rate: Some(Item::DEFAULT_DAILY_RATE.minor()),
        }),
    };
    Config::write(&target, &file).context("Failed to write config")?;

    output::success(format!("Wrote {}", target.display()));
    Ok(())
}
