use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Open, high, low and close prices of one candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Raw OHLC candle as returned by the source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
        }
    }
}

/// Raw volume sample as returned by the source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub volume: f64,
}

impl VolumePoint {
    pub fn new(timestamp_ms: i64, volume: f64) -> Self {
        Self { timestamp_ms, volume }
    }
}

/// A timestamped record whose payload survives normalization
pub trait SeriesPoint {
    type Payload: Copy;

    fn timestamp_ms(&self) -> i64;
    fn payload(&self) -> Self::Payload;
}

impl SeriesPoint for PricePoint {
    type Payload = Ohlc;

    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    fn payload(&self) -> Ohlc {
        Ohlc {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

impl SeriesPoint for VolumePoint {
    type Payload = f64;

    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    fn payload(&self) -> f64 {
        self.volume
    }
}

/// A record moved onto the half-hour grid; the raw timestamp is gone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint<P> {
    pub aligned_time: NaiveDateTime,
    pub value: P,
}

/// One row per aligned interval, in persisted column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    /// Stored as `date_price`
    pub aligned_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when no volume bucket matched
    pub volume: Option<f64>,
}

impl MergedRow {
    pub fn new(aligned_time: NaiveDateTime, ohlc: Ohlc, volume: Option<f64>) -> Self {
        Self {
            aligned_time,
            open: ohlc.open,
            high: ohlc.high,
            low: ohlc.low,
            close: ohlc.close,
            volume,
        }
    }
}
