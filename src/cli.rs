use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::utils::get_config_path;

#[derive(Parser, Debug)]
#[command(name = "coin-series")]
#[command(about = "Incremental CoinGecko OHLC + volume ingestion", long_about = None)]
pub struct Cli {
    /// JSON config file (falls back to COIN_SERIES_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Fetch every configured window and append new rows (default)
    Ingest,
    /// Show latest stored timestamp and row count per table
    Status,
}

pub fn run() {
    let cli = Cli::parse();
    let config_path = cli.config.or_else(get_config_path);

    match cli.command.unwrap_or(Commands::Ingest) {
        Commands::Ingest => {
            commands::ingest::run(config_path);
        }
        Commands::Status => {
            commands::status::run(config_path);
        }
    }
}
