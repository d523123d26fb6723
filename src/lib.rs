pub mod acquisition;
pub mod aggregation;
pub mod cache;
pub mod cli;
pub mod config;
mod error;
pub mod grid;
pub mod layout;
pub mod pipeline;
pub mod regions;
pub mod types;
mod utils;

pub use error::FusionError;
pub use utils::default_data_root;

pub use config::{ConfigError, PipelineConfig};
pub use layout::DataLayout;

pub use types::snapshot::{GridSnapshot, SentinelBand};
pub use types::variable::{
    BucketWidth, ObservationInstant, TimeMethod, VariableCatalog, VariableSpec,
};

pub use grid::definition::GridDefinition;
pub use grid::error::{GridDefinitionError, ParseError};
pub use grid::parser::GridResponseParser;

pub use acquisition::downloader::RetryingDownloader;
pub use acquisition::error::{AttemptFailure, FeedError, FetchError};
pub use acquisition::feed::{FeedResponse, GridFeed, HttpGridFeed};
pub use acquisition::retry::{RetryPolicy, Sleeper, TokioSleeper};

pub use cache::day_cache::DayVariableCache;
pub use cache::error::CacheError;

pub use aggregation::error::AggregationError;
pub use aggregation::spatial_aggregator::{RegionMethod, SpatialAggregator};

pub use regions::error::RegionMappingError;
pub use regions::region_mapping::RegionMapping;

pub use pipeline::acquire::{AcquisitionPipeline, DayAcquisition};
pub use pipeline::error::PipelineError;
pub use pipeline::fusion::FusionPipeline;
pub use pipeline::postprocess::{DayAggregation, PostProcessor};
pub use pipeline::report::RunReport;
pub use pipeline::shutdown::ShutdownSignal;
