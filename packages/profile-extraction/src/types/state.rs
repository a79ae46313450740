//! The record threaded through the pipeline for a single URL.

use serde::Serialize;
use tracing::debug;

use super::metrics::StepMetrics;
use super::profile::ProfileRecord;
use super::verdict::ValidationVerdict;
use crate::error::{ErrorDetail, StepFailure};

/// Position of a state in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Preprocess,
    Extract,
    Validate,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Preprocess => "preprocess",
            Self::Extract => "extract",
            Self::Validate => "validate",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-URL pipeline state.
///
/// Once `error` is set it is never cleared, and the content setters become
/// no-ops: later steps cannot attach `extracted` or `validation` data to a
/// failed state.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    url: String,
    correlation_id: String,
    stage: Stage,

    #[serde(skip)]
    raw_content: Option<String>,
    #[serde(skip)]
    clean_content: Option<String>,
    photo_url: Option<String>,

    extracted: Option<ProfileRecord>,
    validation: Option<ValidationVerdict>,
    metrics: StepMetrics,

    error: Option<String>,
    error_detail: Option<ErrorDetail>,
}

impl PipelineState {
    pub fn new(url: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            correlation_id: correlation_id.into(),
            stage: Stage::Fetch,
            raw_content: None,
            clean_content: None,
            photo_url: None,
            extracted: None,
            validation: None,
            metrics: StepMetrics::new(),
            error: None,
            error_detail: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn raw_content(&self) -> Option<&str> {
        self.raw_content.as_deref()
    }

    pub fn clean_content(&self) -> Option<&str> {
        self.clean_content.as_deref()
    }

    /// Photo found by preprocessing, before any LLM call.
    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    pub fn extracted(&self) -> Option<&ProfileRecord> {
        self.extracted.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationVerdict> {
        self.validation.as_ref()
    }

    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut StepMetrics {
        &mut self.metrics
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        self.error_detail.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// A profile was extracted, whatever the judge said.
    pub fn is_success(&self) -> bool {
        self.extracted.is_some()
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn set_raw_content(&mut self, html: String) {
        if self.refuse_write("raw_content") {
            return;
        }
        self.raw_content = Some(html);
    }

    pub fn set_clean_content(&mut self, text: String, photo_url: Option<String>) {
        if self.refuse_write("clean_content") {
            return;
        }
        self.clean_content = Some(text);
        self.photo_url = photo_url;
    }

    pub fn set_extracted(&mut self, record: ProfileRecord) {
        if self.refuse_write("extracted") {
            return;
        }
        self.extracted = Some(record);
    }

    pub fn set_validation(&mut self, verdict: ValidationVerdict) {
        if self.refuse_write("validation") {
            return;
        }
        self.validation = Some(verdict);
    }

    /// Record a step failure as the sticky error pair.
    ///
    /// The first failure wins; later ones are logged and dropped.
    pub fn record_failure(&mut self, failure: StepFailure) {
        if let Some(existing) = &self.error {
            debug!(
                url = %self.url,
                existing = %existing,
                dropped = %failure,
                "state already failed, keeping first error"
            );
            return;
        }

        let mut detail = failure.detail;
        if detail.stage.is_none() {
            detail.stage = Some(self.stage.as_str().to_string());
        }

        self.error = Some(failure.summary);
        self.error_detail = Some(detail);
    }

    fn refuse_write(&self, field: &str) -> bool {
        if self.error.is_some() {
            debug!(url = %self.url, field, "ignoring write to failed state");
            true
        } else {
            false
        }
    }
}
