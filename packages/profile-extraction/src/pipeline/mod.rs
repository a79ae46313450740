//! The per-URL extraction pipeline.
//!
//! - [`machine`] - state machine sequencing the steps
//! - [`extract`] - LLM extraction of a [`ProfileRecord`](crate::ProfileRecord)
//! - [`validate`] - LLM judge producing a [`ValidationVerdict`](crate::ValidationVerdict)
//! - [`parse`] - tolerant decoding of LLM output
//! - [`tokens`] - token estimation chains and pricing
//! - [`prompts`] - prompt text

pub mod extract;
pub mod machine;
pub mod parse;
pub mod prompts;
pub mod tokens;
pub mod validate;

pub use extract::parse_profile;
pub use machine::{transition, Pipeline};
pub use parse::{parse_json, parse_json_lenient, strip_code_fences, ParseOutcome};
pub use tokens::{
    default_call_chain, pricing_for, CallContext, CostTokens, EstimatorChain, HeuristicTokenizer,
    ModelPricing, OfflineTokens, ResponseUsage, StepMetricTokens, TokenCount, TokenEstimator,
    TokenSource, Tokenizer, TraceTokenSource, TraceTokens,
};
pub use validate::parse_verdict;
