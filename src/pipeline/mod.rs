pub mod acquire;
pub mod calendar;
pub mod error;
pub mod fusion;
pub mod postprocess;
pub mod report;
pub mod shutdown;
pub mod workers;
