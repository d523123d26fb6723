//! Immutable run configuration, built in code or read from a JSON file.

use crate::acquisition::feed::DEFAULT_API_BASE_URL;
use crate::acquisition::retry::RetryPolicy;
use crate::aggregation::spatial_aggregator::RegionMethod;
use crate::layout::DataLayout;
use crate::types::snapshot::SentinelBand;
use crate::types::variable::VariableCatalog;
use crate::utils::default_data_root;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode configuration file '{0}'")]
    Decode(PathBuf, #[source] serde_json::Error),

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("No API auth key configured (set KMA_AUTH_KEY or pass --auth-key)")]
    MissingAuthKey,

    #[error("Expected grid count is unknown: set expected_grid_count, grid_definition_file or region_mapping_file")]
    UnknownGridCount,

    #[error("No region mapping file configured")]
    MissingRegionMapping,

    #[error("Invalid retry policy: {0}")]
    InvalidRetry(String),
}

/// Settings shared by both pipeline phases. Each worker receives its own clone.
///
/// Missing fields in a JSON file fall back to the same defaults as the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct PipelineConfig {
    #[builder(default = default_data_root(), into)]
    pub data_root: PathBuf,
    #[builder(default = DEFAULT_API_BASE_URL.to_string(), into)]
    pub api_base_url: String,
    #[builder(into)]
    pub auth_key: Option<String>,
    #[builder(default = 120)]
    pub request_timeout_secs: u64,
    /// Pause between consecutive requests of one day, for upstream rate limits.
    #[builder(default = 500)]
    pub api_sleep_ms: u64,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub sentinel: SentinelBand,
    #[builder(default)]
    pub variables: VariableCatalog,
    #[builder(default)]
    pub region_method: RegionMethod,
    pub expected_grid_count: Option<usize>,
    #[builder(into)]
    pub grid_definition_file: Option<PathBuf>,
    #[builder(into)]
    pub region_mapping_file: Option<PathBuf>,
    #[builder(default = 30)]
    pub snippet_lines: usize,
    #[builder(default = 500)]
    pub preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    pub async fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Decode(path.to_path_buf(), e))
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_root)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_sleep(&self) -> Duration {
        Duration::from_millis(self.api_sleep_ms)
    }

    /// Checks that every requested variable is in the catalog.
    pub fn validate_variables(&self, keys: &[String]) -> Result<(), ConfigError> {
        match keys.iter().find(|k| self.variables.get(k).is_none()) {
            Some(unknown) => Err(ConfigError::UnknownVariable(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Checks what network acquisition needs beyond [`Self::validate_variables`].
    pub fn validate_for_acquisition(&self, keys: &[String]) -> Result<&str, ConfigError> {
        self.validate_variables(keys)?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry("max_attempts must be at least 1".into()));
        }
        if !self.retry.backoff.is_finite() || self.retry.backoff < 1.0 {
            return Err(ConfigError::InvalidRetry(format!(
                "backoff must be >= 1.0, got {}",
                self.retry.backoff
            )));
        }
        self.auth_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingAuthKey)
    }
}
