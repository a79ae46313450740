//! Sequential batch runner with cooperative cancellation.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pipeline::Pipeline;
use crate::traits::fetcher::PageFetcher;
use crate::traits::llm::LanguageModel;
use crate::types::state::PipelineState;

/// Terminal states for every URL that was started, in input order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<PipelineState>,

    /// Cancellation stopped the loop before every URL was started
    pub interrupted: bool,
}

impl BatchOutcome {
    pub fn successes(&self) -> impl Iterator<Item = &PipelineState> {
        self.results.iter().filter(|s| s.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PipelineState> {
        self.results.iter().filter(|s| !s.is_success())
    }
}

/// Runs a [`Pipeline`] over a URL list, one URL at a time.
///
/// The cancellation token is polled between URLs only; a URL that has
/// started always runs to its terminal state.
pub struct BatchRunner<F: PageFetcher, M: LanguageModel> {
    pipeline: Pipeline<F, M>,
}

impl<F: PageFetcher, M: LanguageModel> BatchRunner<F, M> {
    pub fn new(pipeline: Pipeline<F, M>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline<F, M> {
        &self.pipeline
    }

    pub async fn run(&self, urls: &[String], cancel: &CancellationToken) -> BatchOutcome {
        let total = urls.len();
        let mut results = Vec::with_capacity(total);
        let mut interrupted = false;

        for (index, url) in urls.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    processed = index,
                    remaining = total - index,
                    "shutdown requested, not starting further URLs"
                );
                interrupted = true;
                break;
            }

            info!(url = %url, "processing URL {}/{}", index + 1, total);
            results.push(self.pipeline.process(url).await);
        }

        info!(
            processed = results.len(),
            total,
            interrupted,
            "batch finished"
        );

        BatchOutcome {
            results,
            interrupted,
        }
    }
}
