use crate::acquisition::error::FeedError;
use crate::types::variable::ObservationInstant;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://apihub.kma.go.kr/api/typ01";
const GRID_ENDPOINT: &str = "cgi-bin/url/nph-sfc_obs_nc_api";

/// Raw answer of the upstream feed for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    pub status: StatusCode,
    pub body: String,
}

impl FeedResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// Source of whole-grid snapshots for one instant and variable.
#[async_trait]
pub trait GridFeed: Send + Sync {
    async fn request(
        &self,
        instant: ObservationInstant,
        variable: &str,
    ) -> Result<FeedResponse, FeedError>;
}

/// HTTP implementation against the gridded surface observation endpoint.
/// Always requests the ASCII dump (`disp=A`).
#[derive(Debug, Clone)]
pub struct HttpGridFeed {
    client: Client,
    endpoint: String,
    auth_key: String,
}

impl HttpGridFeed {
    pub fn new(base_url: &str, auth_key: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::ClientBuild)?;
        Ok(Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), GRID_ENDPOINT),
            auth_key: auth_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GridFeed for HttpGridFeed {
    async fn request(
        &self,
        instant: ObservationInstant,
        variable: &str,
    ) -> Result<FeedResponse, FeedError> {
        let tm = instant.tm();
        debug!("Requesting grid tm={} var={} from {}", tm, variable, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("tm", tm.as_str()),
                ("obs", variable),
                ("disp", "A"),
                ("authKey", self.auth_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FeedError::NetworkRequest {
                tm: tm.clone(),
                variable: variable.to_string(),
                source: e,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FeedError::BodyRead {
            tm,
            variable: variable.to_string(),
            source: e,
        })?;
        Ok(FeedResponse { status, body })
    }
}

/// Heuristic for bodies that are an error page rather than a grid dump.
pub fn looks_like_error_response(body: &str) -> bool {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return true;
    }
    let head = crate::utils::truncate_chars(trimmed, 400).to_lowercase();
    if head.contains("<html") || head.contains("<!doctype html") {
        return true;
    }
    if head.contains("forbidden") || head.contains("unauthorized") {
        return true;
    }
    head.contains("error") && !head.contains('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_detection() {
        assert!(looks_like_error_response(""));
        assert!(looks_like_error_response("   \n "));
        assert!(looks_like_error_response("<!DOCTYPE html><html><body>oops</body></html>"));
        assert!(looks_like_error_response("403 Forbidden"));
        assert!(looks_like_error_response("Unauthorized key"));
        assert!(looks_like_error_response("internal error occurred"));
        // Comment headers may legitimately mention "error"
        assert!(!looks_like_error_response("# error margin column\n1.0 2.0"));
        assert!(!looks_like_error_response("1.0, 2.0, 3.0"));
    }

    #[test]
    fn test_endpoint_is_joined_to_base() -> Result<(), FeedError> {
        let feed = HttpGridFeed::new("https://example.test/api/", "key", Duration::from_secs(1))?;
        assert_eq!(
            feed.endpoint(),
            "https://example.test/api/cgi-bin/url/nph-sfc_obs_nc_api"
        );
        Ok(())
    }
}
