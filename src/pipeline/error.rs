use crate::acquisition::error::{FeedError, FetchError};
use crate::aggregation::error::AggregationError;
use crate::cache::error::CacheError;
use crate::config::ConfigError;
use crate::grid::error::GridDefinitionError;
use crate::regions::error::RegionMappingError;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    GridDefinition(#[from] GridDefinitionError),

    #[error(transparent)]
    RegionMapping(#[from] RegionMappingError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Upstream refused the credential for this variable. Not retried.
    #[error("Access to '{variable}' denied on {date} (see {log_path:?})")]
    Authorization {
        date: NaiveDate,
        variable: String,
        log_path: PathBuf,
    },

    /// One (date, variable) could not be acquired in full.
    #[error("Acquisition of '{variable}' for {date} failed")]
    UnitFailure {
        date: NaiveDate,
        variable: String,
        #[source]
        source: FetchError,
    },

    #[error("Record for '{variable}' on {date} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        date: NaiveDate,
        variable: String,
        expected: usize,
        actual: usize,
    },

    /// A whole day is unusable because at least one variable failed.
    #[error("Day {date} failed: {}", describe(.failed))]
    DayFailed {
        date: NaiveDate,
        failed: Vec<(String, String)>,
    },

    #[error("Worker task failed to complete")]
    WorkerJoin(#[from] tokio::task::JoinError),
}

fn describe(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(variable, reason)| format!("{}({})", variable, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, PipelineError::Authorization { .. })
    }
}
