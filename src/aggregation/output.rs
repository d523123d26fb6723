//! Final wide tables: merging per-variable region tables for one date, column
//! ordering, and persistence as interim parquet or BOM-prefixed CSV.

use crate::aggregation::error::AggregationError;
use crate::cache::day_cache::write_parquet_atomic;
use crate::cache::record::DATE;
use crate::regions::region_mapping::{REGION_ID, REGION_NAME};
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::task;

const INDEX_COLUMNS: [&str; 3] = [DATE, REGION_ID, REGION_NAME];
const BUCKET_PREFIXES: [char; 3] = ['t', 'p', 's'];

/// `t0001`, `p2300`, `s0912`, ...
fn is_bucket_column(name: &str, prefix: char) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(prefix) && name.len() == 5 && chars.all(|c| c.is_ascii_digit())
}

/// Index columns first, then temperature, precipitation and snow buckets (each
/// sorted), then anything else in its original order.
pub fn ordered_columns(names: &[&str]) -> Vec<String> {
    let mut ordered: Vec<String> = INDEX_COLUMNS
        .iter()
        .filter(|c| names.contains(c))
        .map(|c| c.to_string())
        .collect();
    for prefix in BUCKET_PREFIXES {
        let mut group: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| is_bucket_column(n, prefix))
            .collect();
        group.sort_unstable();
        ordered.extend(group.into_iter().map(str::to_string));
    }
    let rest: Vec<String> = names
        .iter()
        .filter(|n| !ordered.iter().any(|o| o == *n))
        .map(|n| n.to_string())
        .collect();
    ordered.extend(rest);
    ordered
}

fn select_ordered(df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    let ordered = ordered_columns(&names);
    df.select(ordered)
}

/// Outer-joins per-variable region tables on `(date, region_id)`. Regions present
/// in any input appear once; `None` when there is nothing to merge.
pub fn merge_variables(tables: Vec<DataFrame>) -> Result<Option<DataFrame>, AggregationError> {
    let mut tables = tables.into_iter();
    let Some(first) = tables.next() else {
        return Ok(None);
    };
    let keys = [col(DATE), col(REGION_ID)];
    let merged = tables.fold(first.lazy(), |acc, next| {
        acc.join(
            next.lazy(),
            keys.clone(),
            keys.clone(),
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
    });
    Ok(Some(
        merged
            .sort([DATE, REGION_ID], Default::default())
            .collect()?,
    ))
}

/// Adds `region_name` from `regions` (`region_id, region_name`), rewrites `date`
/// as `YYYY-MM-DD` and orders the columns for output.
pub fn finalize_day(
    merged: DataFrame,
    date: NaiveDate,
    regions: &DataFrame,
) -> Result<DataFrame, AggregationError> {
    let names = regions
        .clone()
        .lazy()
        .select([col(REGION_ID), col(REGION_NAME)]);
    let finalized = merged
        .lazy()
        .left_join(names, col(REGION_ID), col(REGION_ID))
        .with_column(lit(date.format("%Y-%m-%d").to_string()).alias(DATE))
        .sort([REGION_ID], Default::default())
        .collect()?;
    Ok(select_ordered(finalized)?)
}

pub async fn write_interim(df: DataFrame, path: &Path) -> Result<(), AggregationError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AggregationError::DirCreation(parent.to_path_buf(), e))?;
    }
    let rows = df.height();
    write_parquet_atomic(df, path).await?;
    debug!("Wrote interim table ({} rows) to {:?}", rows, path);
    Ok(())
}

/// Writes `df` as CSV with a UTF-8 byte-order mark, creating parent directories.
pub async fn write_csv_with_bom(mut df: DataFrame, path: &Path) -> Result<(), AggregationError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AggregationError::DirCreation(parent.to_path_buf(), e))?;
    }
    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let file = File::create(&path_buf)
            .map_err(|e| AggregationError::OutputWriteIo(path_buf.clone(), e))?;
        CsvWriter::new(file)
            .include_bom(true)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| AggregationError::OutputWritePolars(path_buf.clone(), e))?;
        info!("Wrote {} rows to {:?}", df.height(), path_buf);
        Ok(())
    })
    .await?
}

/// Stacks day tables whose columns may differ (a variable can be absent on some
/// days), sorted by `(date, region_id)`. `None` when `frames` is empty.
pub fn concat_days(frames: Vec<LazyFrame>) -> Result<Option<DataFrame>, AggregationError> {
    if frames.is_empty() {
        return Ok(None);
    }
    let combined = concat_lf_diagonal(frames, UnionArgs::default())?
        .sort([DATE, REGION_ID], Default::default())
        .collect()?;
    Ok(Some(select_ordered(combined)?))
}

/// [`concat_days`] over interim parquet files.
pub async fn concat_interim(paths: Vec<PathBuf>) -> Result<Option<DataFrame>, AggregationError> {
    if paths.is_empty() {
        return Ok(None);
    }
    task::spawn_blocking(move || {
        let frames = paths
            .iter()
            .map(|p| {
                LazyFrame::scan_parquet(p, Default::default())
                    .map_err(|e| AggregationError::InterimScan(p.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        concat_days(frames)
    })
    .await?
}
