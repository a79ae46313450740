//! Extraction step: page text to [`ProfileRecord`] via one LLM call.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::parse::{into_single_object, parse_json, ParseOutcome};
use super::prompts::{format_extract_prompt, EXTRACT_SYSTEM_PROMPT};
use super::tokens::{default_call_chain, pricing_for, CallContext, TokenSource};
use crate::error::StepFailure;
use crate::traits::llm::{CompletionRequest, LanguageModel, TokenUsage};
use crate::types::config::LlmSettings;
use crate::types::metrics::{keys, StepMetrics};
use crate::types::profile::ProfileRecord;
use crate::types::state::PipelineState;

const PARSE_SUMMARY: &str = "LLM output failed validation/parsing";
const SCHEMA_SUMMARY: &str = "LLM output did not match the profile schema";

/// Decode raw extraction output into a profile for `source_url`.
///
/// `source_url` always overwrites whatever the model said. A preprocessing
/// `photo_url` likewise overrides the model's value. Numeric degree years
/// become strings.
pub fn parse_profile(
    raw: &str,
    source_url: &str,
    photo_url: Option<&str>,
) -> ParseOutcome<ProfileRecord> {
    let mut issues = Vec::new();

    let value = match parse_json(raw) {
        Ok(value) => value,
        Err(e) => {
            return ParseOutcome::Failed(
                StepFailure::parse(PARSE_SUMMARY, e.to_string()).with_raw_response(raw),
            )
        }
    };

    if value.is_array() {
        issues.push("unwrapped one-element array".to_string());
    }
    let mut object = match into_single_object(value) {
        Ok(object) => object,
        Err(failure) => return ParseOutcome::Failed(failure.with_raw_response(raw)),
    };

    if let Some(claimed) = object.get("source_url").and_then(Value::as_str) {
        if claimed != source_url {
            debug!(claimed, source_url, "discarding model-supplied source_url");
        }
    }
    object.insert("source_url".into(), Value::String(source_url.to_string()));

    if let Some(photo) = photo_url {
        object.insert("photo_url".into(), Value::String(photo.to_string()));
    }

    let normalized = normalize_degree_years(&mut object);
    if normalized > 0 {
        issues.push(format!("converted {normalized} numeric degree year(s) to strings"));
    }

    match serde_json::from_value::<ProfileRecord>(Value::Object(object)) {
        Ok(record) if issues.is_empty() => ParseOutcome::Parsed(record),
        Ok(record) => ParseOutcome::Degraded {
            value: record,
            issues,
        },
        Err(e) => ParseOutcome::Failed(
            StepFailure::schema(SCHEMA_SUMMARY, e.to_string()).with_raw_response(raw),
        ),
    }
}

fn normalize_degree_years(object: &mut Map<String, Value>) -> usize {
    let Some(Value::Array(degrees)) = object.get_mut("degrees") else {
        return 0;
    };

    let mut converted = 0;
    for degree in degrees.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(Value::Number(n)) = degree.get("year") {
            let year = n.to_string();
            degree.insert("year".into(), Value::String(year));
            converted += 1;
        }
    }
    converted
}

/// Token figures and cost for one LLM call.
pub(crate) fn record_call_metrics(
    metrics: &mut StepMetrics,
    input_key: &str,
    output_key: &str,
    cost_key: &str,
    model: &str,
    call: Option<CallContext<'_>>,
) -> (TokenUsage, TokenSource) {
    let (usage, source) = call
        .and_then(|context| default_call_chain().estimate(&context))
        .unwrap_or((TokenUsage::default(), TokenSource::None));
    let cost = pricing_for(model).cost(usage);

    metrics.record(input_key, usage.input_tokens as f64);
    metrics.record(output_key, usage.output_tokens as f64);
    metrics.record(cost_key, cost);

    (usage, source)
}

/// Run the extraction step against `state`.
///
/// Requires non-empty `clean_content`; empty text fails with a parse
/// failure without calling the model.
pub async fn run(state: &mut PipelineState, llm: &dyn LanguageModel, settings: &LlmSettings) {
    let text = match state.clean_content() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => {
            state.record_failure(StepFailure::parse(
                "No preprocessed content found to extract data from",
                "clean_content is empty",
            ));
            return;
        }
    };
    let url = state.url().to_string();
    let photo_url = state.photo_url().map(str::to_string);

    let request = CompletionRequest::new(
        &settings.model,
        EXTRACT_SYSTEM_PROMPT,
        format_extract_prompt(&text),
    )
    .with_temperature(settings.temperature);

    debug!(url = %url, model = %settings.model, "invoking LLM for extraction");
    let completion = llm.complete(&request).await;

    let prompt = request.rendered_prompt();
    let call = completion.as_ref().ok().map(|c| CallContext {
        prompt: &prompt,
        response: &c.content,
        usage: c.usage,
    });
    let (usage, source) = record_call_metrics(
        state.metrics_mut(),
        keys::EXTRACTION_INPUT_TOKENS,
        keys::EXTRACTION_OUTPUT_TOKENS,
        keys::EXTRACTION_COST,
        &settings.model,
        call,
    );

    let completion = match completion {
        Ok(completion) => completion,
        Err(e) => {
            warn!(url = %url, error = %e, "extraction LLM call failed");
            state.record_failure(e.into_step_failure("LLM API request failed"));
            return;
        }
    };

    match parse_profile(&completion.content, &url, photo_url.as_deref()) {
        ParseOutcome::Parsed(record) => {
            info!(
                url = %url,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                token_source = %source,
                "extraction successful"
            );
            state.set_extracted(record);
        }
        ParseOutcome::Degraded { value, issues } => {
            info!(url = %url, ?issues, token_source = %source, "extraction successful after repairs");
            state.set_extracted(value);
        }
        ParseOutcome::Failed(failure) => {
            warn!(url = %url, error = %failure, "extraction output unusable");
            state.record_failure(failure);
        }
    }
}
