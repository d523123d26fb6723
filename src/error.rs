use crate::acquisition::error::{FeedError, FetchError};
use crate::aggregation::error::AggregationError;
use crate::cache::error::CacheError;
use crate::config::ConfigError;
use crate::grid::error::{GridDefinitionError, ParseError};
use crate::pipeline::error::PipelineError;
use crate::regions::error::RegionMappingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    RegionMapping(#[from] RegionMappingError),

    #[error(transparent)]
    GridDefinition(#[from] GridDefinitionError),
}
