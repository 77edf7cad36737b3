//! Ingestion Constants
//!
//! Fixed values shared by the fetch, normalize and persist stages.

/// Default CoinGecko public API root
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Width of the alignment grid in seconds (30 minutes)
///
/// Every series is bucketed onto this grid regardless of the upstream
/// resolution of the requested window.
pub const ALIGNMENT_SECS: i64 = 30 * 60;

/// Default spacing between two upstream requests
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 10_000;

/// Default HTTP timeout for a single request
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Longest identifier PostgreSQL keeps without truncating (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Key of the volume sub-array inside the market_chart payload
pub const TOTAL_VOLUMES_KEY: &str = "total_volumes";

/// Column names of a persisted series table, in canonical order
pub mod column {
    pub const DATE_PRICE: &str = "date_price";
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const VOLUME: &str = "volume";

    pub const ALL: [&str; 6] = [DATE_PRICE, OPEN, HIGH, LOW, CLOSE, VOLUME];
}

/// Default (table, lookback token) pairs
pub const DEFAULT_WINDOWS: &[(&str, &str)] = &[
    ("half_hour", "1"),
    ("four_hours", "30"),
    ("four_days", "max"),
];
