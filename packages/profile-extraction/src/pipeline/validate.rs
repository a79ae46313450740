//! Validation step: a second LLM call judges the extraction against the page.

use tracing::{debug, info, warn};

use super::extract::record_call_metrics;
use super::parse::{into_single_object, parse_json_lenient, ParseOutcome};
use super::prompts::{format_judge_prompt, JUDGE_SYSTEM_PROMPT};
use super::tokens::CallContext;
use crate::error::StepFailure;
use crate::traits::llm::{CompletionRequest, LanguageModel};
use crate::types::config::LlmSettings;
use crate::types::metrics::keys;
use crate::types::state::PipelineState;
use crate::types::verdict::{ValidationStatus, ValidationVerdict, VERDICT_FIELDS};

const PARSE_SUMMARY: &str = "LLM Judge output failed validation/parsing";
const SCHEMA_SUMMARY: &str = "LLM Judge output had no recognizable status fields";

/// Lowercase, alphanumerics only, `status` suffix dropped.
fn fold_key(key: &str) -> String {
    let folded: String = key
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    match folded.strip_suffix("status") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => folded,
    }
}

fn match_field(key: &str) -> Option<&'static str> {
    let folded = fold_key(key);
    VERDICT_FIELDS
        .iter()
        .copied()
        .find(|field| fold_key(field) == folded)
}

/// Decode raw judge output.
///
/// Tolerates fences, surrounding prose, renamed keys and odd status
/// spellings. Fields the judge skipped default to `NotApplicable` and mark
/// the outcome degraded. Output with no recognizable status key at all is a
/// schema failure rather than an all-`NotApplicable` verdict.
pub fn parse_verdict(raw: &str) -> ParseOutcome<ValidationVerdict> {
    let (value, recovered) = match parse_json_lenient(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            return ParseOutcome::Failed(
                StepFailure::parse(PARSE_SUMMARY, e.to_string()).with_raw_response(raw),
            )
        }
    };

    let object = match into_single_object(value) {
        Ok(object) => object,
        Err(failure) => {
            return ParseOutcome::Failed(
                StepFailure::parse(PARSE_SUMMARY, failure.detail.message).with_raw_response(raw),
            )
        }
    };

    let mut verdict = ValidationVerdict::default();
    let mut issues = Vec::new();
    let mut seen: Vec<&'static str> = Vec::new();

    if recovered {
        issues.push("recovered JSON from surrounding text".to_string());
    }

    for (key, value) in &object {
        if fold_key(key) == "overallcomment" {
            verdict.overall_comment = value.as_str().map(str::to_string);
            continue;
        }

        let Some(field) = match_field(key) else {
            issues.push(format!("ignored unknown key {key:?}"));
            continue;
        };

        let status = value.as_str().and_then(ValidationStatus::parse_lenient);
        if status.is_none() {
            issues.push(format!("unrecognized status {value} for {field}"));
        }
        if let Some(slot) = verdict.slot_mut(field) {
            *slot = status.unwrap_or(ValidationStatus::NotApplicable);
        }
        if !seen.contains(&field) {
            seen.push(field);
        }
    }

    if seen.is_empty() {
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        return ParseOutcome::Failed(
            StepFailure::schema(SCHEMA_SUMMARY, format!("keys present: {keys:?}"))
                .with_raw_response(raw),
        );
    }

    for field in VERDICT_FIELDS.iter().filter(|f| !seen.contains(*f)) {
        issues.push(format!("{field} missing, defaulted to Not Applicable"));
    }

    if issues.is_empty() {
        ParseOutcome::Parsed(verdict)
    } else {
        ParseOutcome::Degraded {
            value: verdict,
            issues,
        }
    }
}

/// Run the validation step against `state`.
///
/// Skipped without error when there is no page text or no extracted
/// record. Failures are recorded on the state like any other step.
pub async fn run(state: &mut PipelineState, llm: &dyn LanguageModel, settings: &LlmSettings) {
    let (Some(text), Some(extracted)) = (state.clean_content(), state.extracted()) else {
        debug!(url = %state.url(), "skipping validation, nothing to validate");
        return;
    };

    let request = CompletionRequest::new(
        &settings.model,
        JUDGE_SYSTEM_PROMPT,
        format_judge_prompt(text, extracted),
    )
    .with_temperature(settings.temperature);
    let url = state.url().to_string();

    debug!(url = %url, model = %settings.model, "invoking LLM judge");
    let completion = llm.complete(&request).await;

    let prompt = request.rendered_prompt();
    let call = completion.as_ref().ok().map(|c| CallContext {
        prompt: &prompt,
        response: &c.content,
        usage: c.usage,
    });
    let (usage, source) = record_call_metrics(
        state.metrics_mut(),
        keys::VALIDATION_INPUT_TOKENS,
        keys::VALIDATION_OUTPUT_TOKENS,
        keys::VALIDATION_COST,
        &settings.model,
        call,
    );

    let completion = match completion {
        Ok(completion) => completion,
        Err(e) => {
            warn!(url = %url, error = %e, "judge LLM call failed");
            state.record_failure(e.into_step_failure("LLM Judge API request failed"));
            return;
        }
    };

    match parse_verdict(&completion.content) {
        ParseOutcome::Parsed(verdict) => {
            info!(
                url = %url,
                correct = verdict.count(ValidationStatus::Correct),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                token_source = %source,
                "validation successful"
            );
            state.set_validation(verdict);
        }
        ParseOutcome::Degraded { value, issues } => {
            warn!(url = %url, ?issues, "judge output patched with defaults");
            state.set_validation(value);
        }
        ParseOutcome::Failed(failure) => {
            warn!(url = %url, error = %failure, "judge output unusable");
            state.record_failure(failure);
        }
    }
}
