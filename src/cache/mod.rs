pub mod day_cache;
pub mod error;
pub mod record;
