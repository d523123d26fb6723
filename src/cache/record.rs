//! Column layout of a day/variable cache record: one row per (grid_idx, hour).

use crate::types::snapshot::GridSnapshot;
use crate::types::variable::date_key;
use chrono::NaiveDate;
use polars::prelude::*;

pub const GRID_IDX: &str = "grid_idx";
pub const DATE: &str = "date";
pub const HOUR: &str = "hour";
pub const VALUE: &str = "value";

/// Builds the cache table for one (date, variable) from per-hour snapshots.
/// Grid index `i` is the position of the value inside its snapshot.
pub fn day_record(date: NaiveDate, snapshots: &[(u32, GridSnapshot)]) -> PolarsResult<DataFrame> {
    let total: usize = snapshots.iter().map(|(_, s)| s.len()).sum();
    let mut grid_idx = Vec::with_capacity(total);
    let mut hours = Vec::with_capacity(total);
    let mut values = Vec::with_capacity(total);
    for (hour, snapshot) in snapshots {
        for (idx, value) in snapshot.values().iter().enumerate() {
            grid_idx.push(idx as u32);
            hours.push(*hour as i32);
            values.push(*value);
        }
    }
    let key = date_key(date);
    let dates = vec![key.as_str(); total];

    df!(
        GRID_IDX => grid_idx,
        DATE => dates,
        HOUR => hours,
        VALUE => values
    )
}

pub fn expected_rows(grid_count: usize, buckets: usize) -> usize {
    grid_count * buckets
}
