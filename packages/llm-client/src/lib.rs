//! Minimal client for OpenAI-compatible chat completion endpoints.
//!
//! Speaks the `/chat/completions` wire format, which OpenAI, Gemini's
//! OpenAI-compatible endpoint and most self-hosted gateways accept. No
//! domain-specific logic lives here.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{ChatClient, ChatRequest};
//!
//! let client = ChatClient::from_env("GOOGLE_API_KEY")?
//!     .with_base_url(llm_client::GEMINI_OPENAI_BASE_URL);
//!
//! let response = client
//!     .chat_completion(&ChatRequest::new("gemini-2.0-flash", "Be terse.", "Hello!").json_object())
//!     .await?;
//! println!("{} ({:?})", response.content, response.usage);
//! ```

pub mod error;
pub mod types;

pub use error::{ChatClientError, Result};
pub use types::*;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

/// OpenAI's own endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Gemini's OpenAI-compatible endpoint.
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Chat completion client.
#[derive(Clone)]
pub struct ChatClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    /// Create a new client with the given API key, pointed at OpenAI.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Create from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        let api_key =
            std::env::var(var).map_err(|_| ChatClientError::Config(format!("{var} not set")))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (Gemini, Azure, proxies, ...).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatClientError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Usage metadata is passed through as-is; callers must cope with
    /// endpoints that omit it.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, model = %request.model, "chat completion request failed");
                ChatClientError::from_transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "chat completion API error");
            return Err(ChatClientError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ChatClientError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ChatClientError::Parse("no choices in response".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            has_usage = raw.usage.is_some(),
            "chat completion"
        );

        Ok(ChatResponse {
            content,
            usage: raw.usage,
            model: raw.model,
        })
    }
}
