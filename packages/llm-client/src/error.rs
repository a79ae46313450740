//! Error types for the chat client.

use thiserror::Error;

/// Result type for chat client operations.
pub type Result<T> = std::result::Result<T, ChatClientError>;

/// Chat client errors.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Configuration error (missing API key, invalid client settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection refused, DNS failure, broken body)
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx response from the endpoint
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ChatClientError {
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
