use crate::types::{PendingEntry, ResponseEntry, SignalReading, RSSI_SENTINELS, UNKNOWN_RANK};
use std::cmp::Ordering;

/// Calibrated power minus received strength, when both are usable and the
/// difference is finite.
pub fn path_loss(reading: &SignalReading) -> Option<f64> {
    let rssi = reading.rssi?;
    let txpower = reading.txpower?;
    if RSSI_SENTINELS.contains(&rssi) {
        return None;
    }
    Some(txpower - rssi).filter(|pl| pl.is_finite())
}

/// Distance estimate `10^(path_loss - 41)`. Overflows to infinity for large path loss.
pub fn compute_distance(reading: &SignalReading) -> Option<f64> {
    path_loss(reading).map(|pl| 10f64.powf(pl - 41.0))
}

/// Nearest first. Unknown distances sort after every known one and tie with each other.
///
/// Compares path loss directly: distance is monotonic in it and path loss cannot overflow.
pub fn compare_proximity(a: &SignalReading, b: &SignalReading) -> Ordering {
    match (path_loss(a), path_loss(b)) {
        (Some(la), Some(lb)) => la.total_cmp(&lb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort, so entries that compare equal keep their input order.
pub fn rank_entries(mut entries: Vec<PendingEntry>) -> Vec<PendingEntry> {
    entries.sort_by(|a, b| compare_proximity(&a.signal, &b.signal));
    entries
}

pub fn project_rank(entry: PendingEntry) -> ResponseEntry {
    ResponseEntry {
        rank: path_loss(&entry.signal).unwrap_or(UNKNOWN_RANK),
        metadata: entry.metadata,
    }
}
