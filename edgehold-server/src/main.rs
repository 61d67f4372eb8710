//! edgehold daemon
//!
//! - `edgehold edge`: connectivity monitor + TCP proxy, local store, syncer, local API
//! - `edgehold central`: report intake reconciling edge reports into the central API
//! - `edgehold config show`: print the effective configuration

// Test-only lints: allow panic!, unwrap() etc. in test code
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

mod api;
mod central;
mod cli;
mod config_commands;
mod edge;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use edgehold_core::config::{default_config_path, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }

    if let Commands::Config(ConfigCommands::Show { json }) = cli.command {
        return config_commands::show_config(&config, json);
    }

    // Dropping the guard flushes buffered file output, so it lives until main returns.
    let _log_guard = edgehold_core::logger::init_logger(&config.log)?;
    tracing::info!(config = %config_path.display(), version = env!("CARGO_PKG_VERSION"), "edgehold starting");

    match cli.command {
        Commands::Edge => edge::run(config.edge).await,
        Commands::Central => central::run(config.central).await,
        Commands::Config(_) => Ok(()),
    }
}
