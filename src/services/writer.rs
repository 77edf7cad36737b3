use crate::error::Result;
use crate::models::MergedRow;
use crate::services::database::SeriesDatabase;
use chrono::NaiveDateTime;
use tracing::{debug, info};

/// Appends only rows newer than what a table already holds
///
/// The strictly-newer filter is the only thing keeping `date_price` unique
/// across runs; two writers racing on one table can both pass it.
pub struct IncrementalWriter<'a> {
    database: &'a SeriesDatabase,
}

impl<'a> IncrementalWriter<'a> {
    pub fn new(database: &'a SeriesDatabase) -> Self {
        Self { database }
    }

    /// Latest persisted aligned time, `None` if the table was never written
    pub async fn latest(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        self.database.latest_date_price(table).await
    }

    /// Write the rows of `rows` that are newer than the table's latest entry
    ///
    /// Creates the table when absent. Returns the number of rows appended.
    pub async fn write(&self, rows: Vec<MergedRow>, table: &str) -> Result<usize> {
        let latest = self.latest(table).await?;
        self.write_after(rows, table, latest).await
    }

    /// Like [`write`](Self::write) with the latest timestamp already known
    pub async fn write_after(
        &self,
        rows: Vec<MergedRow>,
        table: &str,
        latest: Option<NaiveDateTime>,
    ) -> Result<usize> {
        let offered = rows.len();
        let fresh = filter_newer(rows, latest);

        debug!(
            table = table,
            offered = offered,
            fresh = fresh.len(),
            latest = ?latest,
            "Filtered rows against latest timestamp"
        );

        self.database.ensure_table(table).await?;
        let written = self.database.append_rows(table, &fresh).await?;

        info!(table = table, rows = written, "Appended rows");
        Ok(written)
    }
}

/// Keep rows strictly newer than `latest`; everything when `latest` is `None`
pub fn filter_newer(rows: Vec<MergedRow>, latest: Option<NaiveDateTime>) -> Vec<MergedRow> {
    match latest {
        Some(latest) => rows.into_iter().filter(|row| row.aligned_time > latest).collect(),
        None => rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ohlc;
    use chrono::DateTime;
    use tempfile::tempdir;

    fn t(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    fn row(secs: i64) -> MergedRow {
        MergedRow::new(
            t(secs),
            Ohlc { open: 1.0, high: 2.0, low: 0.5, close: 1.5 },
            Some(secs as f64),
        )
    }

    async fn temp_db(dir: &tempfile::TempDir) -> SeriesDatabase {
        let url = format!("sqlite://{}", dir.path().join("writer.db").display());
        SeriesDatabase::connect(&url).await.unwrap()
    }

    #[test]
    fn test_filter_newer_strict() {
        let latest = t(999_999_000);
        let rows = vec![row(999_999_000), row(999_999_000 + 1800)];

        let kept = filter_newer(rows, Some(latest));
        assert_eq!(kept, vec![row(999_999_000 + 1800)]);
    }

    #[test]
    fn test_filter_newer_without_latest() {
        let rows = vec![row(0), row(1800)];
        assert_eq!(filter_newer(rows.clone(), None), rows);
    }

    #[tokio::test]
    async fn test_first_write_takes_everything() {
        let dir = tempdir().unwrap();
        let db = temp_db(&dir).await;
        let writer = IncrementalWriter::new(&db);

        assert_eq!(writer.latest("half_hour").await.unwrap(), None);

        let rows = vec![row(0), row(1800), row(3600)];
        assert_eq!(writer.write(rows, "half_hour").await.unwrap(), 3);
        assert_eq!(writer.latest("half_hour").await.unwrap(), Some(t(3600)));
        db.close().await;
    }

    #[tokio::test]
    async fn test_only_rows_after_latest_are_written() {
        let dir = tempdir().unwrap();
        let db = temp_db(&dir).await;
        let writer = IncrementalWriter::new(&db);

        let base = 999_999_000;
        writer.write(vec![row(base - 1800), row(base)], "half_hour").await.unwrap();

        let written = writer
            .write(vec![row(base), row(base + 1800)], "half_hour")
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(
            db.date_prices("half_hour").await.unwrap(),
            vec![t(base - 1800), t(base), t(base + 1800)]
        );
        db.close().await;
    }

    #[tokio::test]
    async fn test_repeated_write_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = temp_db(&dir).await;
        let writer = IncrementalWriter::new(&db);

        let rows = vec![row(0), row(1800), row(3600)];
        writer.write(rows.clone(), "four_hours").await.unwrap();
        let before = db.date_prices("four_hours").await.unwrap();

        assert_eq!(writer.write(rows, "four_hours").await.unwrap(), 0);
        assert_eq!(db.date_prices("four_hours").await.unwrap(), before);
        db.close().await;
    }

    #[tokio::test]
    async fn test_empty_write_creates_table() {
        let dir = tempdir().unwrap();
        let db = temp_db(&dir).await;
        let writer = IncrementalWriter::new(&db);

        assert_eq!(writer.write(Vec::new(), "four_days").await.unwrap(), 0);
        assert!(db.table_exists("four_days").await.unwrap());
        db.close().await;
    }
}
