//! Parallel phase A: dates are dealt disjointly to workers, each with its own
//! pipeline instance, and outcomes stream back for a running tally.

use crate::acquisition::feed::GridFeed;
use crate::acquisition::retry::Sleeper;
use crate::pipeline::acquire::{day_status, AcquisitionPipeline};
use crate::pipeline::calendar::partition_round_robin;
use crate::pipeline::error::PipelineError;
use crate::pipeline::report::{tally_line, DayStatus, RunReport};
use crate::pipeline::shutdown::ShutdownSignal;
use chrono::NaiveDate;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;

enum WorkerMessage {
    Day(NaiveDate, DayStatus, String),
    Denied(PipelineError),
}

/// Acquires `dates` with up to `workers` concurrent workers.
///
/// `make_pipeline` is called once per worker. No date is given to two workers,
/// so their cache writes never overlap. An authorization failure stops all
/// workers and is returned after they finish their current date.
pub async fn acquire_parallel<F, S, M>(
    dates: &[NaiveDate],
    variables: &[String],
    workers: usize,
    shutdown: &ShutdownSignal,
    make_pipeline: M,
) -> Result<RunReport, PipelineError>
where
    F: GridFeed + 'static,
    S: Sleeper + 'static,
    M: Fn(usize) -> Result<AcquisitionPipeline<F, S>, PipelineError>,
{
    let partitions = partition_round_robin(dates, workers);
    // Every worker is built before any starts, so a construction error leaves nothing running.
    let pipelines = (0..partitions.len())
        .map(&make_pipeline)
        .collect::<Result<Vec<_>, _>>()?;
    let variables: Arc<[String]> = variables.into();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handles = Vec::with_capacity(partitions.len());

    for (worker, (partition, pipeline)) in partitions.into_iter().zip(pipelines).enumerate() {
        let tx = tx.clone();
        let variables = Arc::clone(&variables);
        let shutdown = shutdown.clone();
        info!("Worker {} takes {} dates", worker, partition.len());
        handles.push(tokio::spawn(async move {
            for date in partition {
                if shutdown.is_requested() {
                    break;
                }
                let message = match day_status(pipeline.acquire_day_strict(date, &variables).await) {
                    Ok((status, detail)) => WorkerMessage::Day(date, status, detail),
                    Err(e) => {
                        shutdown.request();
                        WorkerMessage::Denied(e)
                    }
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let total = dates.len();
    let mut report = RunReport::default();
    let mut denied = None;
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Day(date, status, detail) => {
                let line = tally_line(date, &status, &detail);
                if matches!(status, DayStatus::Failed(_)) {
                    error!("{} ({}/{})", line, report.total() + 1, total);
                } else {
                    info!("{} ({}/{})", line, report.total() + 1, total);
                }
                report.record(date, status);
            }
            WorkerMessage::Denied(e) => {
                error!("Stopping all workers: {}", e);
                denied.get_or_insert(e);
            }
        }
    }
    for handle in handles {
        handle.await?;
    }
    match denied {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::feed::FeedResponse;
    use crate::acquisition::retry::RetryPolicy;
    use crate::acquisition::testing::{RecordingSleeper, ScriptedFeed};
    use crate::cache::day_cache::DayVariableCache;
    use crate::config::{ConfigError, PipelineConfig};
    use crate::pipeline::calendar::month_dates;
    use chrono::Datelike;
    use reqwest::StatusCode;
    use std::error::Error;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig::builder()
            .data_root(root)
            .auth_key("test")
            .api_sleep_ms(0)
            .retry(RetryPolicy::new(1, Duration::ZERO, 1.0))
            .build()
    }

    #[tokio::test]
    async fn test_parallel_run_isolates_failed_dates() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let dates = &month_dates(2024, 1)[..6];
        let variables = vec!["ta".to_string()];

        let report = acquire_parallel(dates, &variables, 3, &ShutdownSignal::new(), |_| {
            let feed = ScriptedFeed::new(|instant, _, _| {
                if instant.date().day() == 4 {
                    FeedResponse::ok("garbage")
                } else {
                    FeedResponse::ok("1 2")
                }
            });
            Ok(AcquisitionPipeline::new(config(dir.path()), feed, RecordingSleeper::default(), 2))
        })
        .await?;

        assert_eq!(report.ok.len(), 5);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.day(), 4);

        let cache = DayVariableCache::new(config(dir.path()).layout());
        for date in dates {
            assert_eq!(cache.has(*date, "ta").await, date.day() != 4);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_construction_error_starts_no_worker() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let dates = month_dates(2024, 1);
        let built = std::sync::atomic::AtomicUsize::new(0);

        let result = acquire_parallel(&dates, &["ta".to_string()], 3, &ShutdownSignal::new(), |worker| {
            built.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if worker == 2 {
                return Err(ConfigError::MissingAuthKey.into());
            }
            let feed = ScriptedFeed::constant(2, 1.0);
            Ok(AcquisitionPipeline::new(config(dir.path()), feed, RecordingSleeper::default(), 2))
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Config(ConfigError::MissingAuthKey))));
        assert_eq!(built.load(std::sync::atomic::Ordering::SeqCst), 3);
        // Workers 0 and 1 were never spawned, so nothing reached the cache
        tokio::time::sleep(Duration::from_millis(20)).await;
        let cache = DayVariableCache::new(config(dir.path()).layout());
        for date in &dates {
            assert!(!cache.has(*date, "ta").await);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_forbidden_stops_every_worker() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let dates = month_dates(2024, 1);
        let signal = ShutdownSignal::new();

        let result = acquire_parallel(&dates, &["ta".to_string()], 2, &signal, |_| {
            let feed = ScriptedFeed::new(|_, _, _| FeedResponse::new(StatusCode::FORBIDDEN, ""));
            Ok(AcquisitionPipeline::new(config(dir.path()), feed, RecordingSleeper::default(), 2))
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Authorization { .. })));
        assert!(signal.is_requested());
        Ok(())
    }
}
