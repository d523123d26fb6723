use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionMappingError {
    #[error("Region mapping file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Unsupported region mapping format '{0}', expected .parquet or .csv")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read region mapping '{0}'")]
    Read(PathBuf, #[source] PolarsError),

    #[error("Region mapping has no '{column}' column (tried: {})", tried.join(", "))]
    MissingColumn {
        column: &'static str,
        tried: Vec<&'static str>,
    },

    #[error("Failed processing region mapping: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
