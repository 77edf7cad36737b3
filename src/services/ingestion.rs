//! Ingestion pass orchestration
//!
//! For every configured `(table, window)` pair, in order:
//! fetch OHLC, fetch volume, normalize both, merge, then append the rows
//! newer than the table's latest `date_price`. Upstream requests go through
//! a [`Pacer`]; the transform stages never sleep.

use crate::error::{AppError, Result};
use crate::models::{IngestConfig, LookbackWindow, WindowTable};
use crate::services::database::SeriesDatabase;
use crate::services::market_source::MarketDataSource;
use crate::services::merger::merge;
use crate::services::normalizer::normalize;
use crate::services::pacer::Pacer;
use crate::services::writer::IncrementalWriter;
use chrono::NaiveDateTime;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// What happened to one window during a pass
#[derive(Debug)]
pub struct WindowOutcome {
    pub table: String,
    pub window: LookbackWindow,
    pub ohlc_fetched: usize,
    pub volume_fetched: usize,
    pub merged: usize,
    pub written: usize,
    /// Latest persisted timestamp before this pass wrote anything
    pub latest_before: Option<NaiveDateTime>,
    pub error: Option<AppError>,
}

impl WindowOutcome {
    fn new(entry: &WindowTable) -> Self {
        Self {
            table: entry.table.clone(),
            window: entry.window,
            ohlc_fetched: 0,
            volume_fetched: 0,
            merged: 0,
            written: 0,
            latest_before: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full pass over all windows
#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<WindowOutcome>,
    pub duration: Duration,
}

impl IngestReport {
    pub fn total_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written).sum()
    }

    pub fn failed(&self) -> Vec<&WindowOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }
}

/// Sequential fetch → normalize → merge → write driver
pub struct IngestionDriver<S: MarketDataSource> {
    config: IngestConfig,
    source: S,
    database: SeriesDatabase,
    pacer: Pacer,
}

impl<S: MarketDataSource> IngestionDriver<S> {
    pub fn new(config: IngestConfig, source: S, database: SeriesDatabase) -> Self {
        let pacer = Pacer::new(config.pacing.request_delay());
        Self {
            config,
            source,
            database,
            pacer,
        }
    }

    pub fn database(&self) -> &SeriesDatabase {
        &self.database
    }

    /// Run every configured window once
    ///
    /// With `fail_fast` the first error is returned as-is and later windows
    /// are not touched; tables already written keep their committed rows.
    /// Otherwise failures are recorded in the report and the pass carries on.
    #[instrument(skip(self), fields(asset = %self.config.asset_id, currency = %self.config.currency))]
    pub async fn run(&mut self) -> Result<IngestReport> {
        let start = Instant::now();
        let mut report = IngestReport::default();

        info!(
            windows = self.config.windows.len(),
            pacing_ms = self.pacer.min_interval().as_millis() as u64,
            "Starting ingestion pass"
        );

        for entry in self.config.windows.clone() {
            let mut outcome = WindowOutcome::new(&entry);

            match self.run_window(&entry, &mut outcome).await {
                Ok(()) => {
                    info!(
                        table = %outcome.table,
                        window = %outcome.window,
                        ohlc = outcome.ohlc_fetched,
                        volume = outcome.volume_fetched,
                        merged = outcome.merged,
                        written = outcome.written,
                        latest = ?outcome.latest_before,
                        "Window ingested"
                    );
                }
                Err(e) => {
                    error!(
                        table = %outcome.table,
                        window = %outcome.window,
                        error = %e,
                        "Window ingestion failed"
                    );
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    outcome.error = Some(e);
                }
            }

            report.outcomes.push(outcome);
        }

        report.duration = start.elapsed();
        info!(
            written = report.total_written(),
            failed = report.failed().len(),
            duration_secs = report.duration.as_secs_f64(),
            "Ingestion pass completed"
        );

        Ok(report)
    }

    /// Fetch, transform and persist a single window
    pub async fn run_window(&mut self, entry: &WindowTable, outcome: &mut WindowOutcome) -> Result<()> {
        let asset = self.config.asset_id.as_str();
        let currency = self.config.currency.as_str();
        let basis = self.config.time_basis;

        self.pacer.wait().await;
        let ohlc = self.source.fetch_ohlc(asset, currency, entry.window).await?;
        outcome.ohlc_fetched = ohlc.len();
        let ohlc = normalize(&ohlc, basis)?;

        self.pacer.wait().await;
        let volume = self.source.fetch_volume(asset, currency, entry.window).await?;
        outcome.volume_fetched = volume.len();
        let volume = normalize(&volume, basis)?;

        let rows = merge(&ohlc, &volume);
        outcome.merged = rows.len();

        let writer = IncrementalWriter::new(&self.database);
        let latest = writer.latest(&entry.table).await?;
        outcome.latest_before = latest;
        outcome.written = writer.write_after(rows, &entry.table, latest).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatabaseConfig, PricePoint, TimeBasis, VolumePoint};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Serves canned series per window and counts requests
    #[derive(Default)]
    struct FakeSource {
        ohlc: HashMap<LookbackWindow, Vec<PricePoint>>,
        volume: HashMap<LookbackWindow, Vec<VolumePoint>>,
        failing: Option<LookbackWindow>,
        requests: usize,
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn fetch_ohlc(
            &mut self,
            _asset_id: &str,
            _currency: &str,
            window: LookbackWindow,
        ) -> Result<Vec<PricePoint>> {
            self.requests += 1;
            if self.failing == Some(window) {
                return Err(AppError::RemoteFetch {
                    status: 429,
                    endpoint: format!("fake/ohlc?days={}", window.to_api_token()),
                });
            }
            Ok(self.ohlc.get(&window).cloned().unwrap_or_default())
        }

        async fn fetch_volume(
            &mut self,
            _asset_id: &str,
            _currency: &str,
            window: LookbackWindow,
        ) -> Result<Vec<VolumePoint>> {
            self.requests += 1;
            Ok(self.volume.get(&window).cloned().unwrap_or_default())
        }
    }

    fn t(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    fn test_config(dir: &tempfile::TempDir, windows: Vec<WindowTable>) -> IngestConfig {
        let mut config = IngestConfig {
            windows,
            time_basis: TimeBasis::Utc,
            database: DatabaseConfig {
                url: Some(format!("sqlite://{}", dir.path().join("ingest.db").display())),
                ..Default::default()
            },
            ..Default::default()
        };
        config.pacing.request_delay_ms = 0;
        config
    }

    fn literal_source() -> FakeSource {
        let mut source = FakeSource::default();
        source.ohlc.insert(
            LookbackWindow::Days(1),
            vec![
                PricePoint::new(1_000_000_000_000, 10.0, 12.0, 9.0, 11.0),
                PricePoint::new(1_000_001_800_000, 11.0, 13.0, 10.0, 12.0),
            ],
        );
        source.volume.insert(
            LookbackWindow::Days(1),
            vec![
                VolumePoint::new(1_000_000_000_000, 500.0),
                VolumePoint::new(1_000_001_800_000, 600.0),
            ],
        );
        source
    }

    /// Ten half-hour candles with 5-minute volume samples
    fn dense_source(window: LookbackWindow, start_ms: i64) -> FakeSource {
        let mut source = FakeSource::default();
        let ohlc = (0..10)
            .map(|i| {
                let p = 1.0 + i as f64;
                PricePoint::new(start_ms + i * 1_800_000, p, p + 0.5, p - 0.5, p + 0.25)
            })
            .collect();
        let volume = (0..60)
            .map(|i| VolumePoint::new(start_ms + i * 300_000, 100.0 + i as f64))
            .collect();
        source.ohlc.insert(window, ohlc);
        source.volume.insert(window, volume);
        source
    }

    async fn driver_for(config: IngestConfig, source: FakeSource) -> IngestionDriver<FakeSource> {
        let url = config.database.connection_string().unwrap();
        let database = SeriesDatabase::connect(&url).await.unwrap();
        IngestionDriver::new(config, source, database)
    }

    #[tokio::test]
    async fn test_literal_scenario_end_to_end() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir, vec![WindowTable::new("half_hour", LookbackWindow::Days(1))]);
        let mut driver = driver_for(config, literal_source()).await;

        let report = driver.run().await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.ohlc_fetched, 2);
        assert_eq!(outcome.volume_fetched, 2);
        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.latest_before, None);

        let db = driver.database();
        assert_eq!(db.date_prices("half_hour").await.unwrap(), vec![t(999_999_000)]);
        assert_eq!(driver.source.requests, 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempdir().unwrap();
        let window = LookbackWindow::Days(1);
        let config = test_config(&dir, vec![WindowTable::new("half_hour", window)]);
        let mut driver = driver_for(config, dense_source(window, 1_700_000_000_000)).await;

        let first = driver.run().await.unwrap();
        assert_eq!(first.total_written(), 9);
        let after_first = driver.database().date_prices("half_hour").await.unwrap();

        let second = driver.run().await.unwrap();
        assert_eq!(second.total_written(), 0);
        assert!(second.outcomes[0].latest_before.is_some());
        assert_eq!(driver.database().date_prices("half_hour").await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_later_run_appends_only_new_buckets() {
        let dir = tempdir().unwrap();
        let window = LookbackWindow::Days(1);
        let config = test_config(&dir, vec![WindowTable::new("half_hour", window)]);
        let mut driver = driver_for(config, dense_source(window, 1_700_000_000_000)).await;
        driver.run().await.unwrap();

        // Upstream window slides forward by three buckets
        driver.source = dense_source(window, 1_700_000_000_000 + 3 * 1_800_000);
        let report = driver.run().await.unwrap();
        assert_eq!(report.total_written(), 3);

        let stored = driver.database().date_prices("half_hour").await.unwrap();
        assert_eq!(stored.len(), 12);
        let mut deduped = stored.clone();
        deduped.dedup();
        assert_eq!(deduped, stored);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_error() {
        let dir = tempdir().unwrap();
        let windows = vec![
            WindowTable::new("half_hour", LookbackWindow::Days(1)),
            WindowTable::new("four_hours", LookbackWindow::Days(30)),
            WindowTable::new("four_days", LookbackWindow::Max),
        ];
        let config = test_config(&dir, windows);

        let mut source = dense_source(LookbackWindow::Days(1), 1_700_000_000_000);
        source.failing = Some(LookbackWindow::Days(30));
        let mut driver = driver_for(config, source).await;

        let result = driver.run().await;
        assert!(matches!(result, Err(AppError::RemoteFetch { status: 429, .. })));

        let db = driver.database();
        assert_eq!(db.row_count("half_hour").await.unwrap(), 9);
        assert!(!db.table_exists("four_days").await.unwrap());
    }

    #[tokio::test]
    async fn test_continue_on_error_reports_failures() {
        let dir = tempdir().unwrap();
        let windows = vec![
            WindowTable::new("four_hours", LookbackWindow::Days(30)),
            WindowTable::new("half_hour", LookbackWindow::Days(1)),
        ];
        let mut config = test_config(&dir, windows);
        config.fail_fast = false;

        let mut source = dense_source(LookbackWindow::Days(1), 1_700_000_000_000);
        source.failing = Some(LookbackWindow::Days(30));
        let mut driver = driver_for(config, source).await;

        let report = driver.run().await.unwrap();
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].table, "four_hours");
        assert_eq!(report.total_written(), 9);
    }

    #[tokio::test]
    async fn test_malformed_timestamp_aborts_window() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir, vec![WindowTable::new("half_hour", LookbackWindow::Days(1))]);

        let mut source = FakeSource::default();
        source
            .ohlc
            .insert(LookbackWindow::Days(1), vec![PricePoint::new(-1, 1.0, 1.0, 1.0, 1.0)]);
        let mut driver = driver_for(config, source).await;

        assert!(matches!(driver.run().await, Err(AppError::MalformedRecord(_))));
        assert!(!driver.database().table_exists("half_hour").await.unwrap());
    }

    #[tokio::test]
    async fn test_requests_are_paced() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir, vec![WindowTable::new("half_hour", LookbackWindow::Days(1))]);
        config.pacing.request_delay_ms = 150;
        let mut driver = driver_for(config, literal_source()).await;

        let start = Instant::now();
        driver.run().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
