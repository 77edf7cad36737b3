//! Joining normalized OHLC and volume series into persisted rows

use crate::models::{MergedRow, NormalizedPoint, Ohlc};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Left-join `ohlc` to `volume` on aligned time and trim the newest row
///
/// - each OHLC row takes the first volume sample of its bucket, or `None`
/// - volume buckets without an OHLC row are dropped
/// - rows sharing an aligned time keep the first occurrence
/// - the row with the greatest aligned time is always discarded, since the
///   upstream's newest volume bucket is partial
pub fn merge(ohlc: &[NormalizedPoint<Ohlc>], volume: &[NormalizedPoint<f64>]) -> Vec<MergedRow> {
    let mut volume_by_time: HashMap<NaiveDateTime, f64> = HashMap::with_capacity(volume.len());
    for point in volume {
        volume_by_time.entry(point.aligned_time).or_insert(point.value);
    }

    let mut seen = HashSet::with_capacity(ohlc.len());
    let mut rows: Vec<MergedRow> = ohlc
        .iter()
        .filter(|point| seen.insert(point.aligned_time))
        .map(|point| {
            MergedRow::new(
                point.aligned_time,
                point.value,
                volume_by_time.get(&point.aligned_time).copied(),
            )
        })
        .collect();

    report_mismatch(&rows, &volume_by_time, &seen);

    if let Some(newest) = rows.iter().map(|row| row.aligned_time).max() {
        rows.retain(|row| row.aligned_time != newest);
        debug!(newest = %newest, remaining = rows.len(), "Dropped trailing partial row");
    }

    rows
}

fn report_mismatch(
    rows: &[MergedRow],
    volume_by_time: &HashMap<NaiveDateTime, f64>,
    ohlc_times: &HashSet<NaiveDateTime>,
) {
    let missing_volume = rows.iter().filter(|row| row.volume.is_none()).count();
    let orphan_volume = volume_by_time
        .keys()
        .filter(|time| !ohlc_times.contains(*time))
        .count();

    if missing_volume > 0 || orphan_volume > 0 {
        warn!(
            missing_volume = missing_volume,
            orphan_volume_buckets = orphan_volume,
            rows = rows.len(),
            "OHLC and volume series do not line up; keeping partial join"
        );
    }
}
