//! Time-axis reshaping: coarsening raw samples into hourly or three-hourly
//! buckets, and pivoting a (grid_idx, hour, value) table into one column per bucket.

use crate::aggregation::error::AggregationError;
use crate::cache::record::{DATE, GRID_IDX, HOUR, VALUE};
use crate::types::variable::{BucketWidth, TimeMethod, VariableSpec};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Applies a bucket reduction to one column.
pub fn method_expr(expr: Expr, method: TimeMethod) -> Expr {
    match method {
        TimeMethod::Mean => expr.mean(),
        TimeMethod::Sum => expr.sum(),
        TimeMethod::Last => expr.drop_nulls().last(),
        TimeMethod::Max => expr.max(),
        TimeMethod::Min => expr.min(),
    }
}

/// Reduces timestamped samples to `(grid_idx, date, hour, value_col)`, one row per
/// grid index and bucket. `hour` is the bucket start hour, `date` is `YYYYMMDD`.
pub fn aggregate_to_buckets(
    samples: LazyFrame,
    value_col: &str,
    time_col: &str,
    bucket: BucketWidth,
    method: TimeMethod,
) -> LazyFrame {
    let hour = col(time_col).dt().hour().cast(DataType::Int32);
    let bucket_start = match bucket {
        BucketWidth::OneHour => hour,
        BucketWidth::ThreeHours => hour.clone() - hour % lit(3),
    };
    samples
        .sort([time_col], Default::default())
        .with_columns([
            col(time_col).dt().to_string("%Y%m%d").alias(DATE),
            bucket_start.alias(HOUR),
        ])
        .group_by_stable([col(GRID_IDX), col(DATE), col(HOUR)])
        .agg([method_expr(col(value_col), method).alias(value_col)])
}

/// 5-minute (or finer) samples to hourly buckets.
pub fn aggregate_to_hourly(
    samples: LazyFrame,
    value_col: &str,
    time_col: &str,
    method: TimeMethod,
) -> LazyFrame {
    aggregate_to_buckets(samples, value_col, time_col, BucketWidth::OneHour, method)
}

/// Hourly (or finer) samples to three-hour buckets starting at 00, 03, ..., 21.
pub fn aggregate_to_three_hourly(
    samples: LazyFrame,
    value_col: &str,
    time_col: &str,
    method: TimeMethod,
) -> LazyFrame {
    aggregate_to_buckets(samples, value_col, time_col, BucketWidth::ThreeHours, method)
}

/// Reshapes a `(grid_idx, date, hour, value)` table into one row per
/// `(grid_idx, date)` and one column per canonical bucket label of `spec`.
///
/// Only buckets that occur in the input become columns, in canonical order.
/// Duplicate rows for the same bucket keep the first non-missing value.
pub fn pivot(table: LazyFrame, spec: &VariableSpec) -> Result<DataFrame, AggregationError> {
    let df = table.collect()?;
    for name in [GRID_IDX, DATE, HOUR, VALUE] {
        if df.column(name).is_err() {
            return Err(AggregationError::MissingColumn(name.to_string()));
        }
    }

    let hour_col = df.column(HOUR)?.cast(&DataType::Int32)?;
    let present: BTreeSet<i32> = hour_col.i32()?.into_iter().flatten().collect();

    let buckets: Vec<Expr> = spec
        .bucket
        .bucket_starts()
        .into_iter()
        .filter(|h| present.contains(&(*h as i32)))
        .map(|h| {
            col(VALUE)
                .filter(col(HOUR).eq(lit(h as i32)))
                .drop_nulls()
                .first()
                .alias(spec.bucket.label(&spec.col_prefix, h))
        })
        .collect();

    let pivoted = df
        .lazy()
        .with_column(col(HOUR).cast(DataType::Int32))
        .group_by([col(GRID_IDX), col(DATE)])
        .agg(buckets)
        .sort([GRID_IDX, DATE], Default::default())
        .collect()?;
    Ok(pivoted)
}

/// Names of the bucket columns of `spec` present in `df`, in canonical order.
pub fn value_columns(df: &DataFrame, spec: &VariableSpec) -> Vec<String> {
    let names: BTreeSet<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    spec.bucket_labels()
        .into_iter()
        .filter(|label| names.contains(label.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::variable::VariableCatalog;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::error::Error;

    fn raw_table(grids: u32, hours: &[i32]) -> PolarsResult<DataFrame> {
        let mut grid_idx = Vec::new();
        let mut hour = Vec::new();
        let mut value = Vec::new();
        for h in hours {
            for g in 0..grids {
                grid_idx.push(g);
                hour.push(*h);
                value.push(Some(g as f64 * 100.0 + *h as f64));
            }
        }
        let dates = vec!["20240101"; grid_idx.len()];
        df!(GRID_IDX => grid_idx, DATE => dates, HOUR => hour, VALUE => value)
    }

    #[test]
    fn test_pivot_full_hourly_day() -> Result<(), Box<dyn Error>> {
        let catalog = VariableCatalog::default();
        let spec = catalog.get("ta").ok_or("missing ta")?;
        let hours: Vec<i32> = (0..24).collect();
        let pivoted = pivot(raw_table(3, &hours)?.lazy(), spec)?;

        assert_eq!(pivoted.height(), 3);
        assert_eq!(value_columns(&pivoted, spec), spec.bucket_labels());
        assert_eq!(pivoted.column("t0001")?.f64()?.get(2), Some(200.0));
        assert_eq!(pivoted.column("t2300")?.f64()?.get(1), Some(123.0));
        Ok(())
    }

    #[test]
    fn test_pivot_three_hourly_with_missing_bucket() -> Result<(), Box<dyn Error>> {
        let catalog = VariableCatalog::default();
        let spec = catalog.get("sd_3hr").ok_or("missing sd_3hr")?;
        let pivoted = pivot(raw_table(2, &[0, 3, 9])?.lazy(), spec)?;

        assert_eq!(pivoted.height(), 2);
        assert_eq!(value_columns(&pivoted, spec), ["s0003", "s0306", "s0912"]);
        assert!(pivoted.column("s0609").is_err());
        Ok(())
    }

    #[test]
    fn test_pivot_duplicate_keeps_first_present_value() -> Result<(), Box<dyn Error>> {
        let catalog = VariableCatalog::default();
        let spec = catalog.get("ta").ok_or("missing ta")?;
        let df = df!(
            GRID_IDX => [0u32, 0, 0, 1, 1],
            DATE => ["20240101"; 5],
            HOUR => [5i32, 5, 5, 5, 5],
            VALUE => [None, Some(1.0), Some(9.0), None, None]
        )?;
        let pivoted = pivot(df.lazy(), spec)?;
        // A missing leading duplicate does not hide the value after it
        assert_eq!(pivoted.column("t0506")?.f64()?.get(0), Some(1.0));
        assert_eq!(pivoted.column("t0506")?.f64()?.get(1), None);
        Ok(())
    }

    #[test]
    fn test_pivot_rejects_wrong_schema() -> Result<(), Box<dyn Error>> {
        let catalog = VariableCatalog::default();
        let spec = catalog.get("ta").ok_or("missing ta")?;
        let df = df!(GRID_IDX => [0u32], VALUE => [1.0])?;
        assert!(matches!(
            pivot(df.lazy(), spec),
            Err(AggregationError::MissingColumn(_))
        ));
        Ok(())
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn test_five_minute_to_hourly_mean() -> Result<(), Box<dyn Error>> {
        let samples = df!(
            GRID_IDX => [0u32, 0, 0, 0],
            "datetime" => [at(0, 0), at(0, 5), at(0, 55), at(1, 0)],
            "ta" => [Some(1.0), Some(2.0), Some(3.0), Some(10.0)]
        )?;
        let hourly = aggregate_to_hourly(samples.lazy(), "ta", "datetime", TimeMethod::Mean)
            .sort([HOUR], Default::default())
            .collect()?;

        assert_eq!(hourly.height(), 2);
        assert_eq!(hourly.column(DATE)?.str()?.get(0), Some("20240101"));
        assert_eq!(hourly.column(HOUR)?.i32()?.get(0), Some(0));
        assert_eq!(hourly.column("ta")?.f64()?.get(0), Some(2.0));
        assert_eq!(hourly.column("ta")?.f64()?.get(1), Some(10.0));
        Ok(())
    }

    #[test]
    fn test_hourly_to_three_hourly_last() -> Result<(), Box<dyn Error>> {
        let samples = df!(
            GRID_IDX => [0u32, 0, 0, 0],
            "datetime" => [at(3, 0), at(5, 0), at(4, 0), at(6, 0)],
            "sd_3hr" => [Some(1.0), None, Some(2.0), Some(7.0)]
        )?;
        let buckets =
            aggregate_to_three_hourly(samples.lazy(), "sd_3hr", "datetime", TimeMethod::Last)
                .sort([HOUR], Default::default())
                .collect()?;

        assert_eq!(buckets.height(), 2);
        assert_eq!(buckets.column(HOUR)?.i32()?.get(0), Some(3));
        // Latest non-missing sample of 03:00-05:59 is the 04:00 one
        assert_eq!(buckets.column("sd_3hr")?.f64()?.get(0), Some(2.0));
        assert_eq!(buckets.column(HOUR)?.i32()?.get(1), Some(6));
        Ok(())
    }
}
