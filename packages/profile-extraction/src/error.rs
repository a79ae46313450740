//! Typed errors for the profile extraction library.
//!
//! Pipeline steps never raise: they convert operational failures into a
//! [`StepFailure`] which the state records as its sticky error. The only
//! errors that surface to callers are the batch-level [`ExtractionError`]s
//! (bad input file, report I/O).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fine-grained failure kind recorded on a pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request exceeded the HTTP timeout
    Timeout,
    /// Non-2xx HTTP response
    Http,
    /// Connection, DNS or body-read failure
    Network,
    /// HTML structure unusable or LLM output not valid JSON
    Parse,
    /// JSON valid but does not satisfy the record schema
    Schema,
    /// LLM/API-level failure
    UpstreamApi,
    /// Anything else, including panics caught at the pipeline boundary
    Unexpected,
}

/// Coarse failure taxonomy used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    NetworkFailure,
    ParseFailure,
    SchemaFailure,
    UpstreamApiFailure,
    Unexpected,
}

impl FailureKind {
    pub fn category(self) -> FailureCategory {
        match self {
            Self::Timeout | Self::Http | Self::Network => FailureCategory::NetworkFailure,
            Self::Parse => FailureCategory::ParseFailure,
            Self::Schema => FailureCategory::SchemaFailure,
            Self::UpstreamApi => FailureCategory::UpstreamApiFailure,
            Self::Unexpected => FailureCategory::Unexpected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Schema => "schema",
            Self::UpstreamApi => "upstream_api",
            Self::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured diagnostic correlated 1:1 with a state's `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: FailureKind,

    /// Raw text of the underlying error
    pub message: String,

    /// HTTP status, for `Http` failures and upstream API errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Raw LLM output, kept for offline debugging of parse/schema failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,

    /// Pipeline stage that recorded the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// A failure produced by one pipeline step.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{summary} ({kind}): {}", detail.message)]
pub struct StepFailure {
    pub kind: FailureKind,

    /// Human-readable description; becomes the state's `error`
    pub summary: String,

    pub detail: ErrorDetail,
}

impl StepFailure {
    pub fn new(kind: FailureKind, summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            detail: ErrorDetail {
                kind,
                message: message.into(),
                status_code: None,
                raw_response: None,
                stage: None,
            },
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, "Request timed out", message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Http, format!("HTTP {status} fetching URL"), message)
            .with_status(status)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, "Failed to fetch URL", message)
    }

    pub fn parse(summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, summary, message)
    }

    pub fn schema(summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Schema, summary, message)
    }

    pub fn upstream(summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::UpstreamApi, summary, message)
    }

    pub fn unexpected(summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unexpected, summary, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.detail.status_code = Some(status);
        self
    }

    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.detail.raw_response = Some(raw.into());
        self
    }
}

/// Errors returned by a [`LanguageModel`](crate::traits::llm::LanguageModel).
#[derive(Debug, Error)]
pub enum LlmError {
    /// Client misconfigured (missing key, bad endpoint)
    #[error("LLM configuration error: {0}")]
    Config(String),

    /// Transport-level failure
    #[error("LLM network error: {0}")]
    Network(String),

    /// Call exceeded its timeout
    #[error("LLM request timed out: {0}")]
    Timeout(String),

    /// Provider returned an error response
    #[error("LLM API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider response envelope could not be read
    #[error("LLM response envelope invalid: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Convert into the step failure a pipeline step records.
    pub fn into_step_failure(self, summary: impl Into<String>) -> StepFailure {
        let status = self.status();
        let failure = StepFailure::upstream(summary, self.to_string());
        match status {
            Some(code) => failure.with_status(code),
            None => failure,
        }
    }
}

/// Batch-level errors. These abort a run; per-URL failures never do.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// URL input file does not exist
    #[error("URLs file not found at {path}")]
    InputNotFound { path: String },

    /// URL input file is not a JSON array of strings
    #[error("invalid URLs file {path}: {reason}")]
    InvalidInput { path: String, reason: String },

    /// Filesystem failure while reading inputs or writing outputs
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Tabular output failed
    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl ExtractionError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type alias for batch-level operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for a single step.
pub type StepResult<T> = std::result::Result<T, StepFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_categories() {
        assert_eq!(FailureKind::Timeout.category(), FailureCategory::NetworkFailure);
        assert_eq!(FailureKind::Http.category(), FailureCategory::NetworkFailure);
        assert_eq!(FailureKind::Schema.category(), FailureCategory::SchemaFailure);
        assert_eq!(
            FailureKind::UpstreamApi.category(),
            FailureCategory::UpstreamApiFailure
        );
    }

    #[test]
    fn test_http_failure_carries_status() {
        let failure = StepFailure::http(404, "404 Not Found");
        assert_eq!(failure.kind, FailureKind::Http);
        assert_eq!(failure.detail.status_code, Some(404));
        assert_eq!(failure.summary, "HTTP 404 fetching URL");
    }

    #[test]
    fn test_llm_error_into_step_failure() {
        let failure = LlmError::Api {
            status: 503,
            message: "overloaded".into(),
        }
        .into_step_failure("LLM API request failed");

        assert_eq!(failure.kind, FailureKind::UpstreamApi);
        assert_eq!(failure.detail.status_code, Some(503));
        assert!(failure.detail.message.contains("overloaded"));
    }

    #[test]
    fn test_error_detail_omits_empty_fields() {
        let detail = StepFailure::network("connection refused").detail;
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "network");
        assert!(json.get("status_code").is_none());
        assert!(json.get("raw_response").is_none());
    }
}
