//! Token counting and pricing.
//!
//! Token counts come from several places of varying reliability: an
//! external trace store, provider usage metadata, an offline tokenizer,
//! back-computation from cost. Each is a [`TokenEstimator`] and an
//! [`EstimatorChain`] tries them in order; the first non-zero answer wins.

use serde::{Deserialize, Serialize};

use crate::traits::llm::TokenUsage;
use crate::types::metrics::keys;
use crate::types::state::PipelineState;

/// Where a token figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// External trace store keyed by correlation id
    Trace,
    /// Usage metadata returned with the completion
    ResponseMetadata,
    /// Offline tokenizer over prompt and response text
    Tokenizer,
    /// Sum of per-step metrics
    StepMetrics,
    /// Back-computed from total cost at an average per-token price
    CostEstimate,
    /// No strategy produced a figure
    None,
}

impl TokenSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::ResponseMetadata => "response_metadata",
            Self::Tokenizer => "tokenizer",
            Self::StepMetrics => "step_metrics",
            Self::CostEstimate => "cost_estimate",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A token figure an estimator can produce.
pub trait TokenCount: Copy {
    fn is_zero(&self) -> bool;
}

impl TokenCount for u64 {
    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl TokenCount for TokenUsage {
    fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// One token-counting strategy over context `C`.
pub trait TokenEstimator<C: ?Sized, T: TokenCount>: Send + Sync {
    fn source(&self) -> TokenSource;

    /// `None` or a zero count means "no answer, try the next strategy".
    fn estimate(&self, context: &C) -> Option<T>;
}

/// Ordered fallback over estimators.
pub struct EstimatorChain<C: ?Sized, T: TokenCount> {
    strategies: Vec<Box<dyn TokenEstimator<C, T>>>,
}

impl<C: ?Sized, T: TokenCount> Default for EstimatorChain<C, T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<C: ?Sized, T: TokenCount> EstimatorChain<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; earlier strategies take precedence.
    pub fn then(mut self, estimator: impl TokenEstimator<C, T> + 'static) -> Self {
        self.strategies.push(Box::new(estimator));
        self
    }

    pub fn sources(&self) -> Vec<TokenSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    /// First non-zero estimate, with its source.
    pub fn estimate(&self, context: &C) -> Option<(T, TokenSource)> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .estimate(context)
                .filter(|count| !count.is_zero())
                .map(|count| (count, strategy.source()))
        })
    }
}

// =============================================================================
// Per-call estimation
// =============================================================================

/// What is known about one LLM call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub prompt: &'a str,
    pub response: &'a str,
    pub usage: Option<TokenUsage>,
}

/// Counts tokens in text without a provider round trip.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// ~4 characters per token, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> u64 {
        (text.chars().count() as u64).div_ceil(4)
    }
}

/// Trusts provider usage metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseUsage;

impl<'a> TokenEstimator<CallContext<'a>, TokenUsage> for ResponseUsage {
    fn source(&self) -> TokenSource {
        TokenSource::ResponseMetadata
    }

    fn estimate(&self, context: &CallContext<'a>) -> Option<TokenUsage> {
        context.usage
    }
}

/// Runs a [`Tokenizer`] over the rendered prompt and the raw response.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTokens<K: Tokenizer>(pub K);

impl<'a, K: Tokenizer> TokenEstimator<CallContext<'a>, TokenUsage> for OfflineTokens<K> {
    fn source(&self) -> TokenSource {
        TokenSource::Tokenizer
    }

    fn estimate(&self, context: &CallContext<'a>) -> Option<TokenUsage> {
        Some(TokenUsage::new(
            self.0.count(context.prompt),
            self.0.count(context.response),
        ))
    }
}

/// Provider metadata first, then the heuristic tokenizer.
pub fn default_call_chain<'a>() -> EstimatorChain<CallContext<'a>, TokenUsage> {
    EstimatorChain::new()
        .then(ResponseUsage)
        .then(OfflineTokens(HeuristicTokenizer))
}

// =============================================================================
// Batch estimation
// =============================================================================

/// External store of traced LLM runs (e.g. an observability backend).
pub trait TraceTokenSource: Send + Sync {
    /// Total tokens traced for the given correlation ids, if reachable.
    fn total_tokens(&self, correlation_ids: &[&str]) -> Option<u64>;
}

/// Asks a [`TraceTokenSource`] about every state in the batch.
pub struct TraceTokens<S: TraceTokenSource>(pub S);

impl<S: TraceTokenSource> TokenEstimator<[PipelineState], u64> for TraceTokens<S> {
    fn source(&self) -> TokenSource {
        TokenSource::Trace
    }

    fn estimate(&self, results: &[PipelineState]) -> Option<u64> {
        let ids: Vec<&str> = results.iter().map(|s| s.correlation_id()).collect();
        self.0.total_tokens(&ids)
    }
}

/// Sums the per-step token metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepMetricTokens;

impl TokenEstimator<[PipelineState], u64> for StepMetricTokens {
    fn source(&self) -> TokenSource {
        TokenSource::StepMetrics
    }

    fn estimate(&self, results: &[PipelineState]) -> Option<u64> {
        let total: f64 = results
            .iter()
            .map(|s| s.metrics().sum(&keys::TOKEN_KEYS))
            .sum();
        Some(total as u64)
    }
}

/// Divides total cost by an average per-token price.
#[derive(Debug, Clone, Copy)]
pub struct CostTokens {
    pub pricing: ModelPricing,
}

impl TokenEstimator<[PipelineState], u64> for CostTokens {
    fn source(&self) -> TokenSource {
        TokenSource::CostEstimate
    }

    fn estimate(&self, results: &[PipelineState]) -> Option<u64> {
        let price = self.pricing.average_per_token();
        if price <= 0.0 {
            return None;
        }
        let cost: f64 = results
            .iter()
            .map(|s| s.metrics().sum(&keys::COST_KEYS))
            .sum();
        Some((cost / price) as u64)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// USD per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const GEMINI_FLASH: Self = Self::new(0.35, 0.70);

    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_million
            + usage.output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }

    /// Mean of input and output price, per single token.
    pub fn average_per_token(&self) -> f64 {
        (self.input_per_million + self.output_per_million) / 2.0 / 1_000_000.0
    }
}

/// Known model prefixes and their prices. First matching prefix wins.
const PRICE_TABLE: &[(&str, ModelPricing)] = &[
    ("gemini-1.5-pro", ModelPricing::new(1.25, 5.00)),
    ("gemini-2.0-flash", ModelPricing::GEMINI_FLASH),
    ("gemini-1.5-flash", ModelPricing::GEMINI_FLASH),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
];

/// Price for `model`, falling back to Gemini Flash.
pub fn pricing_for(model: &str) -> ModelPricing {
    let model = model.trim_start_matches("models/");
    PRICE_TABLE
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, pricing)| *pricing)
        .unwrap_or(ModelPricing::GEMINI_FLASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<u64>);

    impl TraceTokenSource for Fixed {
        fn total_tokens(&self, _: &[&str]) -> Option<u64> {
            self.0
        }
    }

    fn state_with(metrics: &[(&str, f64)]) -> PipelineState {
        let mut state = PipelineState::new("https://example.edu/a", "t-1");
        for (key, value) in metrics {
            state.metrics_mut().record(key, *value);
        }
        state
    }

    fn batch_chain(trace: Option<u64>) -> EstimatorChain<[PipelineState], u64> {
        EstimatorChain::new()
            .then(TraceTokens(Fixed(trace)))
            .then(StepMetricTokens)
            .then(CostTokens {
                pricing: ModelPricing::GEMINI_FLASH,
            })
    }

    #[test]
    fn test_usage_metadata_wins_over_tokenizer() {
        let chain = default_call_chain();
        let context = CallContext {
            prompt: "a prompt of some length",
            response: "{}",
            usage: Some(TokenUsage::new(120, 30)),
        };

        let (usage, source) = chain.estimate(&context).unwrap();
        assert_eq!(usage, TokenUsage::new(120, 30));
        assert_eq!(source, TokenSource::ResponseMetadata);
    }

    #[test]
    fn test_zero_usage_falls_through_to_tokenizer() {
        let chain = default_call_chain();
        let context = CallContext {
            prompt: "12345678",
            response: "123",
            usage: Some(TokenUsage::default()),
        };

        let (usage, source) = chain.estimate(&context).unwrap();
        assert_eq!(source, TokenSource::Tokenizer);
        assert_eq!(usage, TokenUsage::new(2, 1));
    }

    #[test]
    fn test_batch_chain_order() {
        let results = vec![state_with(&[
            (keys::EXTRACTION_INPUT_TOKENS, 100.0),
            (keys::EXTRACTION_OUTPUT_TOKENS, 50.0),
            (keys::EXTRACTION_COST, 0.002),
        ])];

        assert_eq!(
            batch_chain(Some(999)).estimate(&results),
            Some((999, TokenSource::Trace))
        );
        assert_eq!(
            batch_chain(None).estimate(&results),
            Some((150, TokenSource::StepMetrics))
        );
    }

    #[test]
    fn test_cost_fallback() {
        let results = vec![state_with(&[(keys::EXTRACTION_COST, 0.00525)])];
        let (tokens, source) = batch_chain(Some(0)).estimate(&results).unwrap();

        assert_eq!(source, TokenSource::CostEstimate);
        // 0.00525 / ((0.35 + 0.70) / 2 / 1e6) = 10_000
        assert!((9_999..=10_000).contains(&tokens));
    }

    #[test]
    fn test_empty_chain_result() {
        let results = vec![state_with(&[])];
        assert_eq!(batch_chain(None).estimate(&results), None);
    }

    #[test]
    fn test_pricing() {
        let cost = pricing_for("gemini-2.0-flash").cost(TokenUsage::new(1_000_000, 1_000_000));
        assert!((cost - 1.05).abs() < 1e-9);
        assert_eq!(pricing_for("models/gemini-1.5-pro-002").input_per_million, 1.25);
        assert_eq!(pricing_for("something-else"), ModelPricing::GEMINI_FLASH);
    }
}
