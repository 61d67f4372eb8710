use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "edgehold",
    about = "edgehold - edge autonomy agent and multi-cluster reconciler",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, env = "EDGEHOLD_CONFIG", help = "Path to config.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "EDGEHOLD_LOG_LEVEL", help = "Overrides log.level")]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the edge agent: proxy, local store, syncer and local API")]
    Edge,

    #[command(about = "Run the central report intake")]
    Central,

    #[command(subcommand, about = "Inspect configuration")]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}
