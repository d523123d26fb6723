//! Both phases in a single pass: each date is downloaded and then aggregated
//! before the next one starts.

use crate::acquisition::feed::GridFeed;
use crate::acquisition::retry::Sleeper;
use crate::pipeline::acquire::{AcquisitionPipeline, DayAcquisition};
use crate::pipeline::calendar::{month_dates, span_months};
use crate::pipeline::error::PipelineError;
use crate::pipeline::postprocess::{
    record_day, record_day_failure, record_period_failure, DayAggregation, PostProcessor,
};
use crate::pipeline::report::RunReport;
use crate::pipeline::shutdown::ShutdownSignal;
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use std::path::PathBuf;

/// Acquires missing caches, then aggregates them, one date at a time.
pub struct FusionPipeline<F: GridFeed, S: Sleeper> {
    acquisition: AcquisitionPipeline<F, S>,
    postprocessor: PostProcessor,
}

#[derive(Debug, Clone)]
pub struct DayRun {
    pub acquisition: DayAcquisition,
    pub aggregation: DayAggregation,
}

impl<F: GridFeed, S: Sleeper> FusionPipeline<F, S> {
    pub fn new(acquisition: AcquisitionPipeline<F, S>, postprocessor: PostProcessor) -> Self {
        Self {
            acquisition,
            postprocessor,
        }
    }

    pub fn acquisition(&self) -> &AcquisitionPipeline<F, S> {
        &self.acquisition
    }

    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocessor
    }

    /// Downloads and aggregates one date and saves the interim day table.
    ///
    /// # Errors
    ///
    /// Any variable that cannot be acquired fails the whole date with
    /// [`PipelineError::DayFailed`] (or [`PipelineError::Authorization`]);
    /// nothing is aggregated for it.
    pub async fn process_day(
        &self,
        date: NaiveDate,
        variables: &[String],
    ) -> Result<DayRun, PipelineError> {
        let acquisition = self.acquisition.acquire_day_strict(date, variables).await?;
        let aggregation = self
            .postprocessor
            .aggregate_day(date, variables, true)
            .await?;
        info!(
            "{}: {} region rows from {:?}",
            date,
            aggregation.rows(),
            aggregation.aggregated
        );
        Ok(DayRun {
            acquisition,
            aggregation,
        })
    }

    /// Processes every day of a month and writes the monthly CSV. Failed days
    /// are recorded in `report` and left out; an authorization failure aborts.
    pub async fn process_month(
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
            match self.process_day(date, variables).await {
                Ok(run) => {
                    if let Some(table) = record_day(report, run.aggregation) {
                        days.push(table.lazy());
                    }
                }
                Err(e) if e.is_authorization() => return Err(e),
                Err(e) => record_day_failure(report, date, &e),
            }
        }
        self.postprocessor.write_month(year, month, days).await
    }

    /// Runs [`Self::process_month`] over a span and writes one CSV per year.
    pub async fn process_range(
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
                    .process_month(year, *month, variables, shutdown, &mut report)
                    .await
                {
                    Ok(Some(table)) => {
                        written.push(self.postprocessor.monthly_output_file(year, *month));
                        yearly.push(table.lazy());
                    }
                    Ok(None) => {}
                    Err(e) if e.is_authorization() => return Err(e),
                    Err(e) => record_period_failure(&mut report, year, *month, &e),
                }
            }
            match self.postprocessor.write_year(year, yearly).await {
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
}
