use crate::grid::error::ParseError;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for tm={tm} var={variable}")]
    NetworkRequest {
        tm: String,
        variable: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body for tm={tm} var={variable}")]
    BodyRead {
        tm: String,
        variable: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Why a single attempt did not produce a snapshot. All of these are retried.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] FeedError),

    #[error("Upstream answered with status {0}")]
    HttpStatus(StatusCode),

    #[error("Response body looks like an error page")]
    ErrorBody,

    #[error("Failed to parse grid response")]
    Parse(#[from] ParseError),
}

impl AttemptFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Transport(_) => "transport",
            AttemptFailure::HttpStatus(_) => "http_status",
            AttemptFailure::ErrorBody => "error_body",
            AttemptFailure::Parse(_) => "parse",
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Access forbidden for var={variable} (tm={tm}); validation_log={}", log_path.display())]
    Forbidden {
        tm: String,
        variable: String,
        log_path: PathBuf,
    },

    #[error("Download failed after {attempts} attempts for tm={tm} var={variable}; validation_log={}", log_path.display())]
    Exhausted {
        tm: String,
        variable: String,
        attempts: u32,
        log_path: PathBuf,
        #[source]
        last_error: AttemptFailure,
    },
}

impl FetchError {
    pub fn log_path(&self) -> &PathBuf {
        match self {
            FetchError::Forbidden { log_path, .. } | FetchError::Exhausted { log_path, .. } => {
                log_path
            }
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, FetchError::Forbidden { .. })
    }
}
