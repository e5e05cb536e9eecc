//! The narrow fetch primitive the source loader calls through
//!
//! Failures are classified at this seam: transport-level problems are
//! transient and retryable, non-success statuses mark the URL as
//! permanently dead.

use async_trait::async_trait;
use mosaic_types::FetchError;

/// Fetches raw source text for a URL
#[async_trait]
pub trait FetchSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Default HTTP fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::ConnectionLost(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|err| FetchError::ConnectionLost(err.to_string()))
    }
}
