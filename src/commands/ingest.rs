//! Ingestion command
//!
//! Runs one pass over every configured window and prints `Done` on success.
//! Scheduling repeated passes is left to cron or an orchestrator; only one
//! pass should run against a database at a time.

use crate::error::Result;
use crate::models::IngestConfig;
use crate::services::{CoinGeckoClient, IngestReport, IngestionDriver, SeriesDatabase};
use std::path::PathBuf;
use tracing::info;

pub fn run(config_path: Option<PathBuf>) {
    let config = super::load_config_or_exit(config_path);

    match super::block_on(ingest(config)) {
        Ok(report) => {
            for outcome in &report.outcomes {
                match outcome.error {
                    None => println!(
                        "   ✅ {} ({}): {} merged, {} written",
                        outcome.table, outcome.window, outcome.merged, outcome.written
                    ),
                    Some(ref e) => println!("   ❌ {} ({}): {}", outcome.table, outcome.window, e),
                }
            }

            if !report.failed().is_empty() {
                eprintln!("\n❌ {} window(s) failed", report.failed().len());
                std::process::exit(1);
            }

            println!("Done");
        }
        Err(e) => {
            eprintln!("\n❌ Ingestion failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Connect, run a full pass with the CoinGecko source, then close the pool
pub async fn ingest(config: IngestConfig) -> Result<IngestReport> {
    let url = config.database.connection_string()?;
    info!(database = %config.database.display_target(), "Connecting to database");

    let database = SeriesDatabase::connect(&url).await?;
    let source = CoinGeckoClient::from_config(&config.http)?;

    let mut driver = IngestionDriver::new(config, source, database);
    let result = driver.run().await;
    driver.database().close().await;

    result
}
