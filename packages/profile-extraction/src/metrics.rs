//! Batch-level aggregation over terminal pipeline states.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::pipeline::tokens::{
    CostTokens, EstimatorChain, ModelPricing, StepMetricTokens, TokenSource, TraceTokenSource,
    TraceTokens,
};
use crate::types::metrics::keys;
use crate::types::state::PipelineState;

/// Summed step times across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StepTimes {
    pub fetch_ms: f64,
    pub preprocess_ms: f64,
    pub extraction_ms: f64,
    pub validation_ms: f64,
}

impl StepTimes {
    pub fn total_ms(&self) -> f64 {
        self.fetch_ms + self.preprocess_ms + self.extraction_ms + self.validation_ms
    }
}

/// Derived batch statistics. Computing them never touches the states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub total_urls: usize,

    /// States with an extracted record, whatever the judge said
    pub successful_extractions: usize,
    pub failed_extractions: usize,

    pub total_cost: f64,
    pub total_tokens: u64,
    pub token_source: TokenSource,

    pub step_times: StepTimes,
    pub total_processing_time_ms: f64,

    /// Averages over successful extractions; zero when there are none
    pub average_cost_per_successful_profile: f64,
    pub average_tokens_per_successful_profile: f64,
    pub average_processing_time_ms_per_successful_profile: f64,
}

/// Step metrics, then a cost-based estimate at Gemini Flash prices.
pub fn batch_token_chain() -> EstimatorChain<[PipelineState], u64> {
    EstimatorChain::new()
        .then(StepMetricTokens)
        .then(CostTokens {
            pricing: ModelPricing::GEMINI_FLASH,
        })
}

/// As [`batch_token_chain`], consulting `trace` first.
pub fn traced_token_chain<S: TraceTokenSource + 'static>(
    trace: S,
) -> EstimatorChain<[PipelineState], u64> {
    EstimatorChain::new()
        .then(TraceTokens(trace))
        .then(StepMetricTokens)
        .then(CostTokens {
            pricing: ModelPricing::GEMINI_FLASH,
        })
}

impl BatchMetrics {
    /// Aggregate with the default token chain.
    pub fn aggregate(results: &[PipelineState]) -> Self {
        Self::aggregate_with(results, &batch_token_chain())
    }

    pub fn aggregate_with(
        results: &[PipelineState],
        tokens: &EstimatorChain<[PipelineState], u64>,
    ) -> Self {
        let total_urls = results.len();
        let successful = results.iter().filter(|s| s.is_success()).count();

        let total_cost: f64 = results
            .iter()
            .map(|s| s.metrics().sum(&keys::COST_KEYS))
            .sum();

        let step_times = results.iter().fold(StepTimes::default(), |mut acc, s| {
            let m = s.metrics();
            acc.fetch_ms += m.get(keys::FETCH_TIME_MS).unwrap_or(0.0);
            acc.preprocess_ms += m.get(keys::PREPROCESS_TIME_MS).unwrap_or(0.0);
            acc.extraction_ms += m.get(keys::EXTRACTION_TIME_MS).unwrap_or(0.0);
            acc.validation_ms += m.get(keys::VALIDATION_TIME_MS).unwrap_or(0.0);
            acc
        });
        let total_processing_time_ms = step_times.total_ms();

        let (total_tokens, token_source) = tokens
            .estimate(results)
            .unwrap_or((0, TokenSource::None));

        let average = |total: f64| {
            if successful > 0 {
                total / successful as f64
            } else {
                0.0
            }
        };

        Self {
            total_urls,
            successful_extractions: successful,
            failed_extractions: total_urls - successful,
            total_cost,
            total_tokens,
            token_source,
            step_times,
            total_processing_time_ms,
            average_cost_per_successful_profile: average(total_cost),
            average_tokens_per_successful_profile: average(total_tokens as f64),
            average_processing_time_ms_per_successful_profile: average(total_processing_time_ms),
        }
    }

    /// Percentage of URLs with an extracted record.
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            self.successful_extractions as f64 / self.total_urls as f64 * 100.0
        }
    }

    pub fn log_summary(&self) {
        info!("--- Processing Summary ---");
        info!(
            total = self.total_urls,
            successful = self.successful_extractions,
            failed = self.failed_extractions,
            "URLs processed (success rate {:.1}%)",
            self.success_rate()
        );
        info!("Total estimated cost: ${:.4}", self.total_cost);
        info!(
            source = %self.token_source,
            "Total tokens: {}",
            self.total_tokens
        );
        info!(
            "Total processing time: {}",
            format_duration(
                Duration::try_from_secs_f64(self.total_processing_time_ms / 1000.0)
                    .unwrap_or_default()
            )
        );
        if self.successful_extractions > 0 {
            info!(
                "Per successful profile: ${:.4}, {:.0} tokens, {:.0} ms",
                self.average_cost_per_successful_profile,
                self.average_tokens_per_successful_profile,
                self.average_processing_time_ms_per_successful_profile
            );
        }
    }
}

/// `1.5s`, `2m 5s`, `1h 2m 3s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }

    let whole = duration.as_secs();
    let (hours, minutes, seconds) = (whole / 3600, (whole % 3600) / 60, whole % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepFailure;
    use crate::types::profile::ProfileRecord;

    fn success(cost: f64) -> PipelineState {
        let mut state = PipelineState::new("https://example.edu/ok", "t-ok");
        state.set_extracted(ProfileRecord::new("https://example.edu/ok"));
        state.metrics_mut().record(keys::EXTRACTION_COST, cost);
        state
    }

    fn failure() -> PipelineState {
        let mut state = PipelineState::new("https://example.edu/bad", "t-bad");
        state.record_failure(StepFailure::unexpected("boom", "boom"));
        state
    }

    #[test]
    fn test_one_success_one_failure() {
        let metrics = BatchMetrics::aggregate(&[success(0.002), failure()]);

        assert_eq!(metrics.total_urls, 2);
        assert_eq!(metrics.successful_extractions, 1);
        assert_eq!(metrics.failed_extractions, 1);
        assert!((metrics.total_cost - 0.002).abs() < 1e-12);
        assert!((metrics.success_rate() - 50.0).abs() < 1e-9);
        assert!((metrics.average_cost_per_successful_profile - 0.002).abs() < 1e-12);
        assert_eq!(metrics.token_source, TokenSource::CostEstimate);
    }

    #[test]
    fn test_step_tokens_preferred_over_cost() {
        let mut ok = success(0.001);
        ok.metrics_mut().record(keys::EXTRACTION_INPUT_TOKENS, 900.0);
        ok.metrics_mut().record(keys::VALIDATION_OUTPUT_TOKENS, 100.0);

        let metrics = BatchMetrics::aggregate(&[ok]);
        assert_eq!(metrics.total_tokens, 1000);
        assert_eq!(metrics.token_source, TokenSource::StepMetrics);
        assert!((metrics.average_tokens_per_successful_profile - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_times_are_summed() {
        let mut a = success(0.0);
        a.metrics_mut().record(keys::FETCH_TIME_MS, 2000.0);
        a.metrics_mut().record(keys::EXTRACTION_TIME_MS, 500.0);
        let mut b = failure();
        b.metrics_mut().record(keys::FETCH_TIME_MS, 100.0);

        let metrics = BatchMetrics::aggregate(&[a, b]);
        assert_eq!(metrics.step_times.fetch_ms, 2100.0);
        assert_eq!(metrics.total_processing_time_ms, 2600.0);
        assert_eq!(metrics.average_processing_time_ms_per_successful_profile, 2600.0);
    }

    #[test]
    fn test_empty_batch() {
        let metrics = BatchMetrics::aggregate(&[]);
        assert_eq!(metrics.total_urls, 0);
        assert_eq!(metrics.success_rate(), 0.0);
        assert_eq!(metrics.token_source, TokenSource::None);
        assert_eq!(metrics.average_cost_per_successful_profile, 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }
}
