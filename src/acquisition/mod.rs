pub mod downloader;
pub mod error;
pub mod feed;
pub mod retry;
#[cfg(test)]
pub(crate) mod testing;
pub mod validation_log;
