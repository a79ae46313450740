//! Faculty Profile Extraction Library
//!
//! Turns university faculty profile pages into structured records. Each URL
//! runs through a fixed pipeline: fetch the page, strip it down to the main
//! text, ask an LLM to extract a [`ProfileRecord`], then ask a second LLM
//! call (the judge) to grade every field against the page text.
//!
//! # Design
//!
//! - One URL at a time; the batch never aborts on a per-URL failure
//! - The first failure on a URL is sticky: later steps cannot clear it or
//!   add data after it
//! - LLM output is decoded tolerantly into a tagged [`ParseOutcome`]
//! - Token counts come from an ordered chain of estimators, first non-zero wins
//!
//! # Usage
//!
//! ```rust,ignore
//! use profile_extraction::{BatchMetrics, BatchRunner, Pipeline, PipelineConfig};
//! use profile_extraction::testing::{MockFetcher, MockLanguageModel};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::new(MockFetcher::new(), MockLanguageModel::new(), PipelineConfig::default())?;
//! let runner = BatchRunner::new(pipeline);
//!
//! let outcome = runner.run(&urls, &CancellationToken::new()).await;
//! BatchMetrics::aggregate(&outcome.results).log_summary();
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator seams (PageFetcher, LanguageModel)
//! - [`types`] - Records, verdicts, pipeline state, configuration
//! - [`pipeline`] - State machine, extraction, validation, parsing, tokens
//! - [`fetchers`] - HTTP fetcher
//! - [`preprocess`] - HTML to main-content text
//! - [`batch`] - Sequential runner with cooperative cancellation
//! - [`metrics`] - Batch aggregation
//! - [`report`] - URL loading and CSV output
//! - [`diagnostics`] - Failure dumps
//! - [`lifecycle`] - Signal handling and one-shot cleanup
//! - [`testing`] - Mock implementations for testing

pub mod batch;
pub mod diagnostics;
pub mod error;
pub mod fetchers;
pub mod lifecycle;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    ErrorDetail, ExtractionError, FailureCategory, FailureKind, LlmError, Result, StepFailure,
    StepResult,
};
pub use traits::{
    fetcher::PageFetcher,
    llm::{Completion, CompletionRequest, LanguageModel, TokenUsage},
};
pub use types::{
    config::{FetchConfig, LlmSettings, PipelineConfig, PreprocessConfig, DEFAULT_MODEL},
    metrics::{keys as metric_keys, StepMetrics},
    profile::{DegreeRecord, ProfileRecord},
    state::{PipelineState, Stage},
    verdict::{ValidationStatus, ValidationVerdict, VERDICT_FIELDS},
};

pub use pipeline::{
    parse_profile, parse_verdict, transition, EstimatorChain, ParseOutcome, Pipeline, TokenSource,
    TraceTokenSource,
};

pub use batch::{BatchOutcome, BatchRunner};
pub use diagnostics::DebugDumper;
pub use fetchers::HttpFetcher;
pub use lifecycle::{install_signal_handler, ResourceGuard};
pub use metrics::{format_duration, traced_token_chain, BatchMetrics};
pub use preprocess::{PreprocessedPage, Preprocessor};
pub use report::{load_urls, save_results, SavedReport};

#[cfg(feature = "openai-compat")]
pub use llm::ChatModel;

// Re-export testing utilities
pub use testing::{MockFetcher, MockLanguageModel};
