//! reqwest-backed page fetcher.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result, StepFailure, StepResult};
use crate::traits::fetcher::PageFetcher;
use crate::types::config::FetchConfig;

/// Fetches pages over HTTP with a fixed politeness delay and no retries.
///
/// # Example
///
/// ```rust,ignore
/// use profile_extraction::fetchers::HttpFetcher;
/// use profile_extraction::FetchConfig;
///
/// let fetcher = HttpFetcher::new(FetchConfig::default())?;
/// let html = fetcher.fetch("https://www.uidaho.edu/people/jdoe").await?;
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExtractionError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Use a preconfigured client. Its own timeout and user agent apply.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn classify(url: &str, error: reqwest::Error) -> StepFailure {
        if error.is_timeout() {
            warn!(url = %url, error = %error, "HTTP request timed out");
            StepFailure::timeout(error.to_string())
        } else if let Some(status) = error.status() {
            StepFailure::http(status.as_u16(), error.to_string())
        } else {
            warn!(url = %url, error = %error, "HTTP request failed");
            StepFailure::network(error.to_string())
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> StepResult<String> {
        if !self.config.politeness_delay.is_zero() {
            debug!(url = %url, delay_ms = self.config.politeness_delay.as_millis() as u64, "politeness delay");
            tokio::time::sleep(self.config.politeness_delay).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "non-success HTTP status");
            return Err(StepFailure::http(status.as_u16(), status.to_string()));
        }

        let html = response.text().await.map_err(|e| Self::classify(url, e))?;
        debug!(url = %url, bytes = html.len(), "HTTP fetch complete");

        Ok(html)
    }
}
