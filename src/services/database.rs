use crate::constants::column;
use crate::error::{AppError, Result};
use crate::models::MergedRow;
use crate::utils::is_sql_identifier;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{PgPool, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Canonical series table for PostgreSQL
///
/// No primary key or unique index: uniqueness of `date_price` is kept by the
/// writer's strictly-newer filter.
const PG_CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        date_price TIMESTAMP NOT NULL,
        open DOUBLE PRECISION NOT NULL,
        high DOUBLE PRECISION NOT NULL,
        low DOUBLE PRECISION NOT NULL,
        close DOUBLE PRECISION NOT NULL,
        volume DOUBLE PRECISION
    )
"#;

/// Canonical series table for SQLite
const SQLITE_CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        date_price DATETIME NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume REAL
    )
"#;

/// Relational store holding one append-only table per window
#[derive(Debug, Clone)]
pub enum SeriesDatabase {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl SeriesDatabase {
    /// Connect using the URL scheme to pick the backend
    ///
    /// `postgres://` and `postgresql://` go to PostgreSQL, `sqlite:` to SQLite
    /// (the file is created if missing).
    pub async fn connect(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            info!("Connected to PostgreSQL");
            Ok(SeriesDatabase::Postgres(pool))
        } else if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(30));
            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?;
            info!("Connected to SQLite");
            Ok(SeriesDatabase::Sqlite(pool))
        } else {
            let scheme = url.split_once(':').map(|(s, _)| s).unwrap_or(url);
            Err(AppError::Config(format!(
                "unsupported database scheme: {} (expected postgresql:// or sqlite:)",
                scheme
            )))
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            SeriesDatabase::Postgres(_) => "postgres",
            SeriesDatabase::Sqlite(_) => "sqlite",
        }
    }

    /// Whether `table` exists in the current schema
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        check_table_name(table)?;

        let exists = match self {
            SeriesDatabase::Postgres(pool) => {
                sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                     WHERE table_schema = current_schema() AND table_name = $1)",
                )
                .bind(table)
                .fetch_one(pool)
                .await?
            }
            SeriesDatabase::Sqlite(pool) => {
                let count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                )
                .bind(table)
                .fetch_one(pool)
                .await?;
                count > 0
            }
        };

        Ok(exists)
    }

    /// Create `table` with the canonical schema unless it already exists
    pub async fn ensure_table(&self, table: &str) -> Result<()> {
        let quoted = quote_table(table)?;

        match self {
            SeriesDatabase::Postgres(pool) => {
                sqlx::query(&PG_CREATE_TABLE.replace("{table}", &quoted))
                    .execute(pool)
                    .await?;
            }
            SeriesDatabase::Sqlite(pool) => {
                sqlx::query(&SQLITE_CREATE_TABLE.replace("{table}", &quoted))
                    .execute(pool)
                    .await?;
            }
        }

        debug!(table = table, "Ensured series table");
        Ok(())
    }

    /// Greatest stored `date_price`; `None` for a missing or empty table
    pub async fn latest_date_price(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        if !self.table_exists(table).await? {
            return Ok(None);
        }

        let query = format!(
            "SELECT date_price FROM {} ORDER BY date_price DESC LIMIT 1",
            quote_table(table)?
        );

        let latest = match self {
            SeriesDatabase::Postgres(pool) => {
                sqlx::query_scalar::<_, NaiveDateTime>(&query)
                    .fetch_optional(pool)
                    .await?
            }
            SeriesDatabase::Sqlite(pool) => {
                sqlx::query_scalar::<_, NaiveDateTime>(&query)
                    .fetch_optional(pool)
                    .await?
            }
        };

        Ok(latest)
    }

    /// Append `rows` to `table` in a single transaction
    pub async fn append_rows(&self, table: &str, rows: &[MergedRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let quoted = quote_table(table)?;
        let mut affected_rows = 0;

        match self {
            SeriesDatabase::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6)",
                    quoted,
                    column::ALL.join(", ")
                );
                let mut transaction = pool.begin().await?;
                for row in rows {
                    let result = sqlx::query(&sql)
                        .bind(row.aligned_time)
                        .bind(row.open)
                        .bind(row.high)
                        .bind(row.low)
                        .bind(row.close)
                        .bind(row.volume)
                        .execute(&mut *transaction)
                        .await?;
                    affected_rows += result.rows_affected() as usize;
                }
                transaction.commit().await?;
            }
            SeriesDatabase::Sqlite(pool) => {
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    quoted,
                    column::ALL.join(", ")
                );
                let mut transaction = pool.begin().await?;
                for row in rows {
                    let result = sqlx::query(&sql)
                        .bind(row.aligned_time)
                        .bind(row.open)
                        .bind(row.high)
                        .bind(row.low)
                        .bind(row.close)
                        .bind(row.volume)
                        .execute(&mut *transaction)
                        .await?;
                    affected_rows += result.rows_affected() as usize;
                }
                transaction.commit().await?;
            }
        }

        Ok(affected_rows)
    }

    /// Number of rows stored in `table` (0 when it does not exist)
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }

        let query = format!("SELECT COUNT(*) FROM {}", quote_table(table)?);
        let count = match self {
            SeriesDatabase::Postgres(pool) => sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await?,
            SeriesDatabase::Sqlite(pool) => sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await?,
        };
        Ok(count)
    }

    /// All stored `date_price` values in ascending order
    #[cfg(test)]
    pub async fn date_prices(&self, table: &str) -> Result<Vec<NaiveDateTime>> {
        if !self.table_exists(table).await? {
            return Ok(Vec::new());
        }

        let query = format!("SELECT date_price FROM {} ORDER BY date_price", quote_table(table)?);
        let values = match self {
            SeriesDatabase::Postgres(pool) => {
                sqlx::query_scalar::<_, NaiveDateTime>(&query).fetch_all(pool).await?
            }
            SeriesDatabase::Sqlite(pool) => {
                sqlx::query_scalar::<_, NaiveDateTime>(&query).fetch_all(pool).await?
            }
        };
        Ok(values)
    }

    /// Close the connection pool
    pub async fn close(&self) {
        match self {
            SeriesDatabase::Postgres(pool) => pool.close().await,
            SeriesDatabase::Sqlite(pool) => pool.close().await,
        }
        info!("{} connection pool closed", self.backend_name());
    }
}

fn check_table_name(table: &str) -> Result<()> {
    if is_sql_identifier(table) {
        Ok(())
    } else {
        Err(AppError::Config(format!("invalid table name: {:?}", table)))
    }
}

fn quote_table(table: &str) -> Result<String> {
    check_table_name(table)?;
    Ok(format!("\"{}\"", table))
}
