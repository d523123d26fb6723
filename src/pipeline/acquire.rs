//! Phase A: download every observation instant a day needs and cache it.

use crate::acquisition::downloader::RetryingDownloader;
use crate::acquisition::feed::{GridFeed, HttpGridFeed};
use crate::acquisition::retry::{Sleeper, TokioSleeper};
use crate::cache::day_cache::DayVariableCache;
use crate::cache::error::CacheError;
use crate::cache::record::{day_record, expected_rows};
use crate::config::{ConfigError, PipelineConfig};
use crate::grid::definition::GridDefinition;
use crate::grid::parser::GridResponseParser;
use crate::pipeline::error::PipelineError;
use crate::pipeline::report::{tally_line, DayStatus, RunReport};
use crate::pipeline::shutdown::ShutdownSignal;
use crate::regions::region_mapping::RegionMapping;
use chrono::{NaiveDate, Timelike};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// Length every snapshot must have. Taken from the config override, else the
/// grid definition file, else the row count of the region mapping.
pub async fn resolve_expected_grid_count(config: &PipelineConfig) -> Result<usize, PipelineError> {
    if let Some(count) = config.expected_grid_count {
        return Ok(count);
    }
    if let Some(path) = &config.grid_definition_file {
        let count = GridDefinition::from_json_file(path).await?.grid_count();
        info!("Expected grid count {} from grid definition {:?}", count, path);
        return Ok(count);
    }
    if let Some(path) = &config.region_mapping_file {
        let count = RegionMapping::load(path).await?.len();
        info!("Expected grid count {} from region mapping {:?}", count, path);
        return Ok(count);
    }
    Err(ConfigError::UnknownGridCount.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableStatus {
    /// A record already existed; nothing was downloaded.
    Cached,
    Downloaded { rows: usize },
}

/// Outcome of ensuring caches for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAcquisition {
    pub date: NaiveDate,
    pub ok: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Variables not produced on this date (seasonal or start-year policy).
    pub excluded: Vec<String>,
}

impl DayAcquisition {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AcquisitionPipeline<F: GridFeed, S: Sleeper> {
    config: PipelineConfig,
    downloader: RetryingDownloader<F, S>,
    cache: DayVariableCache,
    grid_count: usize,
    /// Set once the first request went out; every later one waits `api_sleep` first.
    requested: AtomicBool,
}

impl AcquisitionPipeline<HttpGridFeed, TokioSleeper> {
    /// Builds the production pipeline against the HTTP feed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if a variable is unknown, the auth key
    /// is missing or the retry policy is invalid, and [`PipelineError::Feed`]
    /// if the HTTP client cannot be built.
    pub fn connect(
        config: PipelineConfig,
        variables: &[String],
        grid_count: usize,
    ) -> Result<Self, PipelineError> {
        let auth_key = config.validate_for_acquisition(variables)?;
        let feed = HttpGridFeed::new(&config.api_base_url, auth_key, config.request_timeout())?;
        Ok(Self::new(config, feed, TokioSleeper, grid_count))
    }
}

impl<F: GridFeed, S: Sleeper> AcquisitionPipeline<F, S> {
    pub fn new(config: PipelineConfig, feed: F, sleeper: S, grid_count: usize) -> Self {
        let layout = config.layout();
        let downloader = RetryingDownloader::builder()
            .feed(feed)
            .sleeper(sleeper)
            .parser(GridResponseParser::new(grid_count, config.sentinel))
            .layout(layout.clone())
            .policy(config.retry)
            .snippet_lines(config.snippet_lines)
            .preview_chars(config.preview_chars)
            .build();
        Self {
            config,
            downloader,
            cache: DayVariableCache::new(layout),
            grid_count,
            requested: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &DayVariableCache {
        &self.cache
    }

    pub fn downloader(&self) -> &RetryingDownloader<F, S> {
        &self.downloader
    }

    /// Makes sure `(date, variable)` is cached, downloading every instant in
    /// time order when it is not. Nothing is written unless all instants succeed.
    pub async fn ensure_variable(
        &self,
        date: NaiveDate,
        variable: &str,
    ) -> Result<VariableStatus, PipelineError> {
        if self.cache.has(date, variable).await {
            debug!("{} for {} already cached", variable, date);
            return Ok(VariableStatus::Cached);
        }
        let spec = self
            .config
            .variables
            .get(variable)
            .ok_or_else(|| ConfigError::UnknownVariable(variable.to_string()))?;

        let instants = spec.observation_instants(date);
        let mut snapshots = Vec::with_capacity(instants.len());
        for instant in instants {
            self.pace().await;
            match self.downloader.fetch(instant, variable).await {
                Ok(snapshot) => snapshots.push((instant.datetime().hour(), snapshot)),
                Err(e) if e.is_forbidden() => {
                    error!("Access to {} denied at {}", variable, instant);
                    return Err(PipelineError::Authorization {
                        date,
                        variable: variable.to_string(),
                        log_path: e.log_path().clone(),
                    });
                }
                Err(e) => {
                    return Err(PipelineError::UnitFailure {
                        date,
                        variable: variable.to_string(),
                        source: e,
                    })
                }
            }
        }

        let record = day_record(date, &snapshots).map_err(CacheError::RecordBuild)?;
        let expected = expected_rows(self.grid_count, spec.bucket.buckets_per_day());
        if record.height() != expected {
            return Err(PipelineError::RowCountMismatch {
                date,
                variable: variable.to_string(),
                expected,
                actual: record.height(),
            });
        }
        let rows = record.height();
        self.cache.store(date, variable, record).await?;
        Ok(VariableStatus::Downloaded { rows })
    }

    /// Rate limit shared by all variables and dates this pipeline fetches.
    async fn pace(&self) {
        if self.requested.swap(true, Ordering::Relaxed) {
            self.downloader.sleeper().sleep(self.config.api_sleep()).await;
        }
    }

    /// Ensures caches for every requested variable of `date`. A failing
    /// variable is recorded and does not stop its siblings; only an
    /// authorization failure propagates.
    pub async fn ensure_day_cache(
        &self,
        date: NaiveDate,
        variables: &[String],
    ) -> Result<DayAcquisition, PipelineError> {
        let (available, excluded) = self.config.variables.split_available(variables, date);
        let mut result = DayAcquisition {
            date,
            ok: Vec::new(),
            failed: Vec::new(),
            excluded: excluded.iter().map(|v| v.to_string()).collect(),
        };
        if !result.excluded.is_empty() {
            info!("{}: not produced on this date: {:?}", date, result.excluded);
        }

        for variable in available {
            match self.ensure_variable(date, variable).await {
                Ok(_) => result.ok.push(variable.to_string()),
                Err(e) if e.is_authorization() => return Err(e),
                Err(e) => {
                    warn!("{}: {} failed: {}", date, variable, e);
                    let reason = match &e {
                        PipelineError::UnitFailure { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    result.failed.push((variable.to_string(), reason));
                }
            }
        }
        Ok(result)
    }

    /// Like [`Self::ensure_day_cache`], but any failed variable fails the day.
    pub async fn acquire_day_strict(
        &self,
        date: NaiveDate,
        variables: &[String],
    ) -> Result<DayAcquisition, PipelineError> {
        let result = self.ensure_day_cache(date, variables).await?;
        if result.is_complete() {
            Ok(result)
        } else {
            Err(PipelineError::DayFailed {
                date,
                failed: result.failed,
            })
        }
    }

    /// Acquires `dates` in order, isolating failures per date. Stops taking new
    /// dates once `shutdown` is requested. An authorization failure ends the run.
    pub async fn acquire_dates(
        &self,
        dates: &[NaiveDate],
        variables: &[String],
        shutdown: &ShutdownSignal,
    ) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        for (i, date) in dates.iter().enumerate() {
            if shutdown.is_requested() {
                warn!("Stop requested; {} dates not started", dates.len() - i);
                break;
            }
            let status = day_status(self.acquire_day_strict(*date, variables).await)?;
            info!("{}", tally_line(*date, &status.0, &status.1));
            report.record(*date, status.0);
        }
        Ok(report)
    }
}

/// Turns a strict day result into a tally entry, passing authorization failures through.
pub(crate) fn day_status(
    result: Result<DayAcquisition, PipelineError>,
) -> Result<(DayStatus, String), PipelineError> {
    match result {
        Ok(day) => Ok((DayStatus::Ok, day.ok.join(","))),
        Err(e) if e.is_authorization() => Err(e),
        Err(PipelineError::DayFailed { failed, .. }) => {
            let reason = failed
                .iter()
                .map(|(v, r)| format!("{}({})", v, r))
                .collect::<Vec<_>>()
                .join(", ");
            Ok((DayStatus::Failed(reason), String::new()))
        }
        Err(e) => Ok((DayStatus::Failed(e.to_string()), String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::feed::FeedResponse;
    use crate::acquisition::retry::RetryPolicy;
    use crate::acquisition::testing::{RecordingSleeper, ScriptedFeed};
    use crate::cache::record::{HOUR, VALUE};
    use chrono::Datelike;
    use polars::prelude::*;
    use reqwest::StatusCode;
    use std::error::Error;
    use std::time::Duration;
    use tempfile::TempDir;

    const GRIDS: usize = 3;

    fn config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig::builder()
            .data_root(root)
            .auth_key("test")
            .retry(RetryPolicy::new(2, Duration::from_secs(1), 2.0))
            .build()
    }

    fn pipeline(root: &std::path::Path, feed: ScriptedFeed) -> AcquisitionPipeline<ScriptedFeed, RecordingSleeper> {
        AcquisitionPipeline::new(config(root), feed, RecordingSleeper::default(), GRIDS)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vars(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_day_is_downloaded_in_order_and_cached() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let feed = ScriptedFeed::new(|instant, _, _| {
            let hour = instant.datetime().hour();
            FeedResponse::ok(format!("{0} {0} -999", hour))
        });
        let p = pipeline(dir.path(), feed);
        let date = ymd(2024, 1, 5);

        let status = p.ensure_variable(date, "ta").await?;
        assert_eq!(status, VariableStatus::Downloaded { rows: GRIDS * 24 });

        let calls = p.downloader().sleeper().sleeps();
        assert_eq!(calls.len(), 23, "rate-limit pause between consecutive instants");
        assert!(calls.iter().all(|d| *d == Duration::from_millis(500)));

        let record = p
            .cache()
            .load(date, "ta")
            .await?
            .ok_or("not cached")?
            .filter(col(HOUR).eq(lit(7)))
            .collect()?;
        assert_eq!(record.height(), GRIDS);
        assert_eq!(record.column(VALUE)?.f64()?.get(0), Some(7.0));
        assert_eq!(record.column(VALUE)?.null_count(), 1);

        // Second call is a cache hit and makes no requests
        let before = p.downloader_calls();
        assert_eq!(p.ensure_variable(date, "ta").await?, VariableStatus::Cached);
        assert_eq!(p.downloader_calls(), before);
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_spans_variables_and_dates() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let p = pipeline(dir.path(), ScriptedFeed::constant(GRIDS, 1.0));

        p.ensure_day_cache(ymd(2024, 1, 5), &vars(&["ta", "rn_60m"])).await?;
        p.ensure_day_cache(ymd(2024, 1, 6), &vars(&["ta"])).await?;

        let requests = p.downloader_calls();
        assert_eq!(requests, 24 * 3);
        let pauses = p.downloader().sleeper().sleeps();
        assert_eq!(pauses.len(), requests - 1);
        assert!(pauses.iter().all(|d| *d == Duration::from_millis(500)));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_variable_does_not_stop_siblings() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let feed = ScriptedFeed::new(|instant, variable, _| {
            if variable == "rn_60m" && instant.datetime().hour() == 13 {
                FeedResponse::ok("1 2")
            } else {
                FeedResponse::ok("0.5 0.5 0.5")
            }
        });
        let p = pipeline(dir.path(), feed);
        let date = ymd(2024, 1, 5);

        let day = p.ensure_day_cache(date, &vars(&["ta", "rn_60m"])).await?;
        assert_eq!(day.ok, ["ta"]);
        assert_eq!(day.failed.len(), 1);
        assert_eq!(day.failed[0].0, "rn_60m");
        assert!(!day.is_complete());
        // Nothing partial is cached for the failed variable
        assert!(!p.cache().has(date, "rn_60m").await);
        assert!(p.cache().has(date, "ta").await);

        let strict = p.acquire_day_strict(date, &vars(&["ta", "rn_60m"])).await;
        assert!(matches!(strict, Err(PipelineError::DayFailed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_seasonal_exclusion_skips_network() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let p = pipeline(dir.path(), ScriptedFeed::constant(GRIDS, 1.0));

        let day = p.ensure_day_cache(ymd(2024, 7, 1), &vars(&["sd_3hr"])).await?;
        assert_eq!(day.excluded, ["sd_3hr"]);
        assert!(day.ok.is_empty());
        assert_eq!(p.downloader_calls(), 0);

        let day = p.ensure_day_cache(ymd(2024, 1, 1), &vars(&["sd_3hr"])).await?;
        assert_eq!(day.ok, ["sd_3hr"]);
        assert_eq!(p.downloader_calls(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_range_isolates_dates_and_stops_on_forbidden() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let feed = ScriptedFeed::new(|instant, _, _| {
            if instant.date().day0() == 1 {
                FeedResponse::ok("")
            } else {
                FeedResponse::ok("1 1 1")
            }
        });
        let p = pipeline(dir.path(), feed);
        let dates = [ymd(2024, 1, 1), ymd(2024, 1, 2), ymd(2024, 1, 3)];

        let report = p
            .acquire_dates(&dates, &vars(&["ta"]), &ShutdownSignal::new())
            .await?;
        assert_eq!(report.ok, [ymd(2024, 1, 1), ymd(2024, 1, 3)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ymd(2024, 1, 2));
        assert!(report.failed[0].1.starts_with("ta("));

        let dir = TempDir::new()?;
        let denied = pipeline(
            dir.path(),
            ScriptedFeed::new(|_, _, _| FeedResponse::new(StatusCode::FORBIDDEN, "no")),
        );
        let result = denied.acquire_dates(&dates, &vars(&["ta"]), &ShutdownSignal::new()).await;
        assert!(matches!(result, Err(PipelineError::Authorization { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_date() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let p = pipeline(dir.path(), ScriptedFeed::constant(GRIDS, 1.0));
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        let report = p.acquire_dates(&[ymd(2024, 1, 1)], &vars(&["ta"]), &shutdown).await?;
        assert_eq!(report.total(), 0);
        assert_eq!(p.downloader_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_grid_count_resolution_order() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let grid = dir.path().join("grid.json");
        tokio::fs::write(&grid, r#"{"nx": 3, "ny": 4}"#).await?;

        let config = PipelineConfig::builder().grid_definition_file(grid.clone()).build();
        assert_eq!(resolve_expected_grid_count(&config).await?, 12);

        let config = PipelineConfig::builder()
            .expected_grid_count(5)
            .grid_definition_file(grid)
            .build();
        assert_eq!(resolve_expected_grid_count(&config).await?, 5);

        let config = PipelineConfig::builder().build();
        assert!(matches!(
            resolve_expected_grid_count(&config).await,
            Err(PipelineError::Config(ConfigError::UnknownGridCount))
        ));
        Ok(())
    }

    impl AcquisitionPipeline<ScriptedFeed, RecordingSleeper> {
        fn downloader_calls(&self) -> usize {
            self.downloader.feed().calls().len()
        }
    }
}
