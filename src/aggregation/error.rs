use crate::cache::error::CacheError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Required column '{0}' not found in table")]
    MissingColumn(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Failed to create output directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing output file '{0}'")]
    OutputWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing output file '{0}'")]
    OutputWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to scan interim file '{0}'")]
    InterimScan(PathBuf, #[source] PolarsError),

    #[error("Failed to persist interim table")]
    Interim(#[from] CacheError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
