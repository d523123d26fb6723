pub mod error;
pub mod output;
pub mod spatial_aggregator;
pub mod time_aggregator;
