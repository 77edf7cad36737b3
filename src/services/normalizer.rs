//! Half-hour alignment of raw series
//!
//! Timestamps arrive as epoch milliseconds at whatever resolution the
//! upstream window uses. Every point is moved down to the preceding
//! 30-minute boundary and re-expressed as a calendar timestamp.

use crate::constants::ALIGNMENT_SECS;
use crate::error::{AppError, Result};
use crate::models::{NormalizedPoint, SeriesPoint, TimeBasis};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Epoch seconds of the 30-minute boundary at or before `timestamp_ms`
pub fn align_epoch_seconds(timestamp_ms: i64) -> Result<i64> {
    if timestamp_ms < 0 {
        return Err(AppError::MalformedRecord(format!(
            "negative timestamp: {}",
            timestamp_ms
        )));
    }

    let secs = timestamp_ms / 1000;
    Ok(secs - secs % ALIGNMENT_SECS)
}

/// Calendar timestamp for an epoch-seconds value
pub fn to_calendar(epoch_secs: i64, basis: TimeBasis) -> Result<NaiveDateTime> {
    let out_of_range = || AppError::MalformedRecord(format!("timestamp out of range: {}", epoch_secs));

    match basis {
        TimeBasis::Utc => DateTime::from_timestamp(epoch_secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(out_of_range),
        TimeBasis::Local => Local
            .timestamp_opt(epoch_secs, 0)
            .earliest()
            .map(|dt| dt.naive_local())
            .ok_or_else(out_of_range),
    }
}

/// Align every point of `points`, preserving input order
pub fn normalize<P: SeriesPoint>(points: &[P], basis: TimeBasis) -> Result<Vec<NormalizedPoint<P::Payload>>> {
    points
        .iter()
        .map(|point| {
            let aligned = align_epoch_seconds(point.timestamp_ms())?;
            Ok(NormalizedPoint {
                aligned_time: to_calendar(aligned, basis)?,
                value: point.payload(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ohlc, PricePoint, VolumePoint};

    fn utc(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn test_align_is_grid_multiple_and_not_later() {
        let samples = [
            0_i64,
            999,
            1_799_999,
            1_800_000,
            1_000_000_000_000,
            1_000_001_800_000,
            1_700_000_123_456,
            1_712_345_678_901,
        ];

        for ts in samples {
            let aligned = align_epoch_seconds(ts).unwrap();
            assert_eq!(aligned % ALIGNMENT_SECS, 0, "not on grid: {}", ts);
            assert!(aligned * 1000 <= ts, "aligned past original: {}", ts);
            assert!(ts - aligned * 1000 < ALIGNMENT_SECS * 1000);
        }
    }

    #[test]
    fn test_align_known_values() {
        assert_eq!(align_epoch_seconds(1_000_000_000_000).unwrap(), 999_999_000);
        assert_eq!(align_epoch_seconds(1_000_001_800_000).unwrap(), 1_000_000_800);
        assert_eq!(align_epoch_seconds(1_800_000).unwrap(), 1800);
        assert_eq!(align_epoch_seconds(1_000_000_000_500).unwrap(), 999_999_000);
    }

    #[test]
    fn test_negative_timestamp_is_malformed() {
        assert!(matches!(align_epoch_seconds(-1), Err(AppError::MalformedRecord(_))));
    }

    #[test]
    fn test_normalize_ohlc_utc() {
        let points = vec![
            PricePoint::new(1_000_000_000_000, 10.0, 12.0, 9.0, 11.0),
            PricePoint::new(1_000_001_800_000, 11.0, 13.0, 10.0, 12.0),
        ];

        let normalized = normalize(&points, TimeBasis::Utc).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].aligned_time, utc(999_999_000));
        assert_eq!(normalized[1].aligned_time, utc(1_000_000_800));
        assert_eq!(
            normalized[0].value,
            Ohlc { open: 10.0, high: 12.0, low: 9.0, close: 11.0 }
        );
    }

    #[test]
    fn test_normalize_preserves_order_and_duplicates() {
        // Five-minute volume samples collapse onto the same bucket
        let points = vec![
            VolumePoint::new(1_800_000 + 600_000, 3.0),
            VolumePoint::new(1_800_000, 1.0),
            VolumePoint::new(1_800_000 + 300_000, 2.0),
        ];

        let normalized = normalize(&points, TimeBasis::Utc).unwrap();
        let values: Vec<f64> = normalized.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
        assert!(normalized.iter().all(|p| p.aligned_time == utc(1800)));
    }

    #[test]
    fn test_normalize_local_matches_local_clock() {
        let points = vec![VolumePoint::new(1_700_000_123_456, 1.0)];
        let normalized = normalize(&points, TimeBasis::Local).unwrap();

        let aligned = align_epoch_seconds(1_700_000_123_456).unwrap();
        let expected = Local.timestamp_opt(aligned, 0).earliest().unwrap().naive_local();
        assert_eq!(normalized[0].aligned_time, expected);
    }

    #[test]
    fn test_normalize_empty() {
        let points: Vec<PricePoint> = Vec::new();
        assert!(normalize(&points, TimeBasis::Utc).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_fails_on_bad_point() {
        let points = vec![VolumePoint::new(1_800_000, 1.0), VolumePoint::new(-5, 2.0)];
        assert!(matches!(
            normalize(&points, TimeBasis::Utc),
            Err(AppError::MalformedRecord(_))
        ));
    }
}
