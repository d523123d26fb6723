//! Phase B: cached records to per-region wide tables, without network access.

use crate::aggregation::output::{
    concat_days, concat_interim, finalize_day, merge_variables, write_csv_with_bom, write_interim,
};
use crate::aggregation::spatial_aggregator::SpatialAggregator;
use crate::aggregation::time_aggregator::{pivot, value_columns};
use crate::cache::day_cache::DayVariableCache;
use crate::config::{ConfigError, PipelineConfig};
use crate::layout::DataLayout;
use crate::pipeline::calendar::{month_dates, span_months};
use crate::pipeline::error::PipelineError;
use crate::pipeline::report::{tally_line, DayStatus, RunReport};
use crate::pipeline::shutdown::ShutdownSignal;
use crate::regions::region_mapping::RegionMapping;
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use polars::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

/// Result of aggregating one date from cache.
#[derive(Debug, Clone)]
pub struct DayAggregation {
    pub date: NaiveDate,
    /// `None` when no requested variable had a cache record.
    pub table: Option<DataFrame>,
    pub aggregated: Vec<String>,
    /// Variables with no cache record for this date.
    pub skipped: Vec<String>,
    /// Variables not produced on this date.
    pub excluded: Vec<String>,
}

impl DayAggregation {
    pub fn rows(&self) -> usize {
        self.table.as_ref().map_or(0, DataFrame::height)
    }
}

/// Aggregates cached days against a region mapping loaded once per instance.
pub struct PostProcessor {
    config: PipelineConfig,
    layout: DataLayout,
    cache: DayVariableCache,
    aggregator: SpatialAggregator,
    regions: DataFrame,
}

impl PostProcessor {
    /// Loads the region mapping named by the config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if no mapping file is configured and
    /// [`PipelineError::RegionMapping`] if it cannot be read.
    pub async fn load(config: PipelineConfig) -> Result<Self, PipelineError> {
        let path = config
            .region_mapping_file
            .clone()
            .ok_or(ConfigError::MissingRegionMapping)?;
        let mapping = RegionMapping::load(&path).await?;
        Self::with_mapping(config, Arc::new(mapping))
    }

    pub fn with_mapping(
        config: PipelineConfig,
        mapping: Arc<RegionMapping>,
    ) -> Result<Self, PipelineError> {
        let regions = mapping.unique_regions()?;
        let layout = config.layout();
        Ok(Self {
            cache: DayVariableCache::new(layout.clone()),
            layout,
            aggregator: SpatialAggregator::new(mapping),
            regions,
            config,
        })
    }

    pub fn aggregator(&self) -> &SpatialAggregator {
        &self.aggregator
    }

    /// Pivots and region-aggregates one cached variable. `Ok(None)` on a cache miss.
    pub async fn aggregate_variable(
        &self,
        date: NaiveDate,
        variable: &str,
    ) -> Result<Option<DataFrame>, PipelineError> {
        let spec = self
            .config
            .variables
            .get(variable)
            .ok_or_else(|| ConfigError::UnknownVariable(variable.to_string()))?
            .clone();
        let Some(record) = self.cache.load(date, variable).await? else {
            return Ok(None);
        };
        let aggregator = self.aggregator.clone();
        let method = self.config.region_method;
        let table = task::spawn_blocking(move || {
            let pivoted = pivot(record, &spec)?;
            let columns = value_columns(&pivoted, &spec);
            aggregator.aggregate_to_regions(pivoted.lazy(), &columns, method)
        })
        .await??;
        debug!("{} on {}: {} region rows", variable, date, table.height());
        Ok(Some(table))
    }

    /// Aggregates every requested variable with a cache record and merges them
    /// into one table for `date`. Missing caches are recorded, not raised.
    pub async fn aggregate_day(
        &self,
        date: NaiveDate,
        variables: &[String],
        save_interim: bool,
    ) -> Result<DayAggregation, PipelineError> {
        let (available, excluded) = self.config.variables.split_available(variables, date);
        let mut result = DayAggregation {
            date,
            table: None,
            aggregated: Vec::new(),
            skipped: Vec::new(),
            excluded: excluded.iter().map(|v| v.to_string()).collect(),
        };

        let mut tables = Vec::with_capacity(available.len());
        for variable in available {
            match self.aggregate_variable(date, variable).await? {
                Some(table) => {
                    tables.push(table);
                    result.aggregated.push(variable.to_string());
                }
                None => result.skipped.push(variable.to_string()),
            }
        }

        if let Some(merged) = merge_variables(tables)? {
            let table = finalize_day(merged, date, &self.regions)?;
            if save_interim {
                write_interim(table.clone(), &self.layout.interim_file(date)).await?;
            }
            result.table = Some(table);
        }
        Ok(result)
    }

    /// Aggregates all days of a month (day failures are isolated into `report`)
    /// and writes the monthly CSV when any day produced rows.
    pub async fn aggregate_month(
        &self,
        year: i32,
        month: u32,
        variables: &[String],
        shutdown: &ShutdownSignal,
        report: &mut RunReport,
    ) -> Result<Option<DataFrame>, PipelineError> {
        let mut days = Vec::new();
        for date in month_dates(year, month) {
            if shutdown.is_requested() {
                warn!("Stop requested; leaving {}-{:02} incomplete", year, month);
                break;
            }
            match self.aggregate_day(date, variables, true).await {
                Ok(day) => {
                    if let Some(table) = record_day(report, day) {
                        days.push(table.lazy());
                    }
                }
                Err(e) => record_day_failure(report, date, &e),
            }
        }
        self.write_month(year, month, days).await
    }

    /// Concatenates day tables and writes the monthly CSV; `None` when there are none.
    pub(crate) async fn write_month(
        &self,
        year: i32,
        month: u32,
        days: Vec<LazyFrame>,
    ) -> Result<Option<DataFrame>, PipelineError> {
        let Some(table) = concat_days(days)? else {
            info!("{}-{:02}: no days with data", year, month);
            return Ok(None);
        };
        let path = self.layout.monthly_output_file(year, month);
        write_csv_with_bom(table.clone(), &path).await?;
        info!("{}-{:02}: {} rows written to {:?}", year, month, table.height(), path);
        Ok(Some(table))
    }

    pub(crate) fn monthly_output_file(&self, year: i32, month: u32) -> PathBuf {
        self.layout.monthly_output_file(year, month)
    }

    /// Runs [`Self::aggregate_month`] over a span and writes one CSV per year.
    /// A failing month or year is logged and recorded; the rest of the span continues.
    pub async fn aggregate_range(
        &self,
        start_year: i32,
        end_year: i32,
        start_month: u32,
        end_month: u32,
        variables: &[String],
        shutdown: &ShutdownSignal,
    ) -> Result<(RunReport, Vec<PathBuf>), PipelineError> {
        let mut report = RunReport::default();
        let mut written = Vec::new();
        let months = span_months(start_year, end_year, start_month, end_month);

        for year in start_year..=end_year {
            let mut yearly = Vec::new();
            for (_, month) in months.iter().filter(|(y, _)| *y == year) {
                if shutdown.is_requested() {
                    break;
                }
                match self
                    .aggregate_month(year, *month, variables, shutdown, &mut report)
                    .await
                {
                    Ok(Some(table)) => {
                        written.push(self.layout.monthly_output_file(year, *month));
                        yearly.push(table.lazy());
                    }
                    Ok(None) => {}
                    Err(e) => record_period_failure(&mut report, year, *month, &e),
                }
            }
            match self.write_year(year, yearly).await {
                Ok(Some(path)) => written.push(path),
                Ok(None) => {}
                Err(e) => record_period_failure(&mut report, year, 1, &e),
            }
            if shutdown.is_requested() {
                break;
            }
        }
        Ok((report, written))
    }

    pub(crate) async fn write_year(
        &self,
        year: i32,
        months: Vec<LazyFrame>,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let Some(table) = concat_days(months)? else {
            return Ok(None);
        };
        let path = self.layout.yearly_output_file(year);
        write_csv_with_bom(table, &path).await?;
        Ok(Some(path))
    }

    /// Rewrites the monthly CSV from existing interim day tables, without
    /// reading any cache record.
    pub async fn rebuild_month_from_interim(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let mut paths = Vec::new();
        for date in month_dates(year, month) {
            let path = self.layout.interim_file(date);
            if tokio::fs::metadata(&path).await.is_ok() {
                paths.push(path);
            }
        }
        let Some(table) = concat_interim(paths).await? else {
            return Ok(None);
        };
        let path = self.layout.monthly_output_file(year, month);
        write_csv_with_bom(table, &path).await?;
        Ok(Some(path))
    }
}

/// Logs the running tally for one aggregated day and records it. Returns the
/// day table when there is one.
pub(crate) fn record_day(report: &mut RunReport, day: DayAggregation) -> Option<DataFrame> {
    if !day.skipped.is_empty() {
        let status = DayStatus::Skipped(format!("missing_cache={:?}", day.skipped));
        warn!("{}", tally_line(day.date, &status, ""));
        report.record(day.date, status);
    }
    let table = day.table?;
    let detail = format!("{} rows ({})", table.height(), day.aggregated.join(","));
    info!("{}", tally_line(day.date, &DayStatus::Ok, &detail));
    report.record(day.date, DayStatus::Ok);
    Some(table)
}

pub(crate) fn record_day_failure(report: &mut RunReport, date: NaiveDate, error: &PipelineError) {
    let status = DayStatus::Failed(error.to_string());
    error!("{}", tally_line(date, &status, ""));
    report.record(date, status);
}

pub(crate) fn record_period_failure(report: &mut RunReport, year: i32, month: u32, error: &PipelineError) {
    error!("Output for {}-{:02} failed: {}", year, month, error);
    if let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) {
        report.record(first, DayStatus::Failed(format!("output {}-{:02}: {}", year, month, error)));
    }
}
