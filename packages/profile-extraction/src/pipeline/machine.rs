//! Per-URL state machine.
//!
//! ```text
//! Fetch -> Preprocess -> Extract -> Validate -> Done
//!   |          |            |
//!   +----------+------------+-----> Error
//! ```
//!
//! Each step converts its own failures into the state's sticky error.
//! Validate always advances to Done. A panic escaping a step is caught here
//! and recorded as an `Unexpected` failure, then follows the same transition
//! as any other failure of that step, so `process` always returns a terminal
//! state.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::{extract, validate};
use crate::diagnostics::DebugDumper;
use crate::error::{Result, StepFailure};
use crate::preprocess::Preprocessor;
use crate::traits::fetcher::PageFetcher;
use crate::traits::llm::LanguageModel;
use crate::types::config::PipelineConfig;
use crate::types::metrics::keys;
use crate::types::state::{PipelineState, Stage};

/// Next stage after running `current`.
pub fn transition(current: Stage, has_error: bool) -> Stage {
    match current {
        Stage::Fetch | Stage::Preprocess | Stage::Extract if has_error => Stage::Error,
        Stage::Fetch => Stage::Preprocess,
        Stage::Preprocess => Stage::Extract,
        Stage::Extract => Stage::Validate,
        Stage::Validate => Stage::Done,
        terminal @ (Stage::Done | Stage::Error) => terminal,
    }
}

/// The per-URL pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use profile_extraction::{Pipeline, PipelineConfig};
/// use profile_extraction::fetchers::HttpFetcher;
///
/// let config = PipelineConfig::default().with_debug_dir("debug");
/// let fetcher = HttpFetcher::new(config.fetch.clone())?;
/// let pipeline = Pipeline::new(fetcher, llm, config)?;
///
/// let state = pipeline.process("https://www.uidaho.edu/people/jdoe").await;
/// if let Some(profile) = state.extracted() {
///     println!("{:?}", profile.full_name());
/// }
/// ```
pub struct Pipeline<F: PageFetcher, M: LanguageModel> {
    fetcher: F,
    llm: M,
    preprocessor: Preprocessor,
    dumper: Option<DebugDumper>,
    config: PipelineConfig,
}

impl<F: PageFetcher, M: LanguageModel> Pipeline<F, M> {
    pub fn new(fetcher: F, llm: M, config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            llm,
            preprocessor: Preprocessor::new(&config.preprocess)?,
            dumper: config.debug_dir.clone().map(DebugDumper::new),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn llm(&self) -> &M {
        &self.llm
    }

    /// Run one URL to a terminal state. Never panics, never errors.
    pub async fn process(&self, url: &str) -> PipelineState {
        let mut state = PipelineState::new(url, self.config.next_correlation_id());

        let driven = AssertUnwindSafe(self.drive(&mut state)).catch_unwind().await;
        if let Err(payload) = driven {
            // The stage is only advanced after a step returns, so this is the
            // step that panicked.
            let stage = state.stage();
            let message = panic_message(payload.as_ref());
            error!(url = %url, stage = %stage, panic = %message, "step panicked");
            state.record_failure(StepFailure::unexpected(
                "An unexpected error occurred while processing URL",
                message,
            ));
            if matches!(stage, Stage::Extract | Stage::Validate) {
                self.dump_if_failed(&state, stage).await;
            }
            state.set_stage(transition(stage, true));
            self.report_terminal(&state);
        }

        state
    }

    async fn drive(&self, state: &mut PipelineState) {
        loop {
            let stage = state.stage();
            match stage {
                Stage::Fetch => self.fetch(state).await,
                Stage::Preprocess => self.preprocess(state),
                Stage::Extract => {
                    let start = Instant::now();
                    extract::run(state, &self.llm, &self.config.extraction).await;
                    record_elapsed(state, keys::EXTRACTION_TIME_MS, start);
                    self.dump_if_failed(state, stage).await;
                }
                Stage::Validate => {
                    let start = Instant::now();
                    validate::run(state, &self.llm, &self.config.judge).await;
                    record_elapsed(state, keys::VALIDATION_TIME_MS, start);
                    self.dump_if_failed(state, stage).await;
                }
                Stage::Done | Stage::Error => {
                    self.report_terminal(state);
                    return;
                }
            }

            let next = transition(stage, state.has_error());
            debug!(url = %state.url(), from = %stage, to = %next, "stage transition");
            state.set_stage(next);
        }
    }

    async fn fetch(&self, state: &mut PipelineState) {
        debug!(url = %state.url(), "fetching");
        let start = Instant::now();
        let fetched = self.fetcher.fetch(state.url()).await;
        record_elapsed(state, keys::FETCH_TIME_MS, start);

        match fetched {
            Ok(html) => {
                debug!(url = %state.url(), bytes = html.len(), "fetched");
                state.set_raw_content(html);
            }
            Err(failure) => state.record_failure(failure),
        }
    }

    fn preprocess(&self, state: &mut PipelineState) {
        let start = Instant::now();
        let processed = match state.raw_content() {
            Some(html) => self.preprocessor.process(html, state.url()),
            None => Err(StepFailure::parse(
                "No HTML content found to preprocess",
                "raw_content is empty",
            )),
        };
        record_elapsed(state, keys::PREPROCESS_TIME_MS, start);

        match processed {
            Ok(page) => state.set_clean_content(page.text, page.photo_url),
            Err(failure) => state.record_failure(failure),
        }
    }

    async fn dump_if_failed(&self, state: &PipelineState, stage: Stage) {
        let failed_here = state
            .error_detail()
            .and_then(|d| d.stage.as_deref())
            .is_some_and(|s| s == stage.as_str());

        if let (true, Some(dumper)) = (failed_here, &self.dumper) {
            dumper.dump(state).await;
        }
    }

    fn report_terminal(&self, state: &PipelineState) {
        let Some(message) = state.error() else {
            info!(url = %state.url(), success = state.is_success(), "pipeline finished");
            return;
        };

        let detail = state
            .error_detail()
            .and_then(|d| serde_json::to_string_pretty(d).ok())
            .unwrap_or_else(|| "No further details provided.".to_string());

        if state.is_success() {
            // Extraction succeeded; only the judge failed.
            warn!(url = %state.url(), error = %message, detail = %detail, "pipeline finished with validation error");
        } else {
            error!(
                url = %state.url(),
                correlation_id = %state.correlation_id(),
                error = %message,
                detail = %detail,
                "pipeline failed"
            );
        }
    }
}

fn record_elapsed(state: &mut PipelineState, key: &str, start: Instant) {
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(url = %state.url(), metric = key, elapsed_ms, "step timing");
    state.metrics_mut().record(key, elapsed_ms);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(transition(Stage::Fetch, false), Stage::Preprocess);
        assert_eq!(transition(Stage::Preprocess, false), Stage::Extract);
        assert_eq!(transition(Stage::Extract, false), Stage::Validate);
        assert_eq!(transition(Stage::Validate, false), Stage::Done);
    }

    #[test]
    fn test_error_transitions() {
        assert_eq!(transition(Stage::Fetch, true), Stage::Error);
        assert_eq!(transition(Stage::Preprocess, true), Stage::Error);
        assert_eq!(transition(Stage::Extract, true), Stage::Error);
        assert_eq!(transition(Stage::Validate, true), Stage::Done);
    }

    #[test]
    fn test_terminal_states_absorb() {
        for has_error in [false, true] {
            assert_eq!(transition(Stage::Done, has_error), Stage::Done);
            assert_eq!(transition(Stage::Error, has_error), Stage::Error);
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
