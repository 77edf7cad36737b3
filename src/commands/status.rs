use crate::error::Result;
use crate::models::IngestConfig;
use crate::services::SeriesDatabase;
use std::path::PathBuf;

pub fn run(config_path: Option<PathBuf>) {
    let config = super::load_config_or_exit(config_path);

    println!("📊 Series Status ({} / {})\n", config.asset_id, config.currency);

    if let Err(e) = super::block_on(show_status(&config)) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn show_status(config: &IngestConfig) -> Result<()> {
    let database = SeriesDatabase::connect(&config.database.connection_string()?).await?;
    println!("🗄️  Database: {}\n", config.database.display_target());

    for entry in &config.windows {
        let count = database.row_count(&entry.table).await?;
        match database.latest_date_price(&entry.table).await? {
            Some(latest) => println!(
                "🔹 {:<12} {:>8}  {:>10} rows  latest {}",
                entry.table,
                entry.window.to_string(),
                format_number(count),
                latest.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!(
                "🔹 {:<12} {:>8}  {:>10}       (never written)",
                entry.table,
                entry.window.to_string(),
                "-"
            ),
        }
    }

    database.close().await;
    Ok(())
}

fn format_number(n: i64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
