pub mod ingest;
pub mod status;

use crate::error::Result;
use crate::models::IngestConfig;
use std::path::PathBuf;

/// Load config or exit with a readable message
fn load_config_or_exit(config_path: Option<PathBuf>) -> IngestConfig {
    match IngestConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

/// Run `future` to completion on a fresh runtime, exiting on runtime failure
fn block_on<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(future)
}
