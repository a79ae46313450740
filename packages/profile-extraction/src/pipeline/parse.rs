//! Parsing of semi-structured LLM output.
//!
//! Models wrap JSON in markdown fences, return one-element arrays where an
//! object was asked for, and surround the payload with prose. The helpers
//! here peel those layers off and report what happened as a
//! [`ParseOutcome`] instead of probing shapes at every call site.

use serde_json::{Map, Value};

use crate::error::{StepFailure, StepResult};

/// Tagged result of decoding LLM output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    /// Decoded without any repair
    Parsed(T),

    /// Decoded after recovery or default-filling; `issues` says what was patched
    Degraded { value: T, issues: Vec<String> },

    /// Unusable
    Failed(StepFailure),
}

impl<T> ParseOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Parsed(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn into_result(self) -> StepResult<T> {
        match self {
            Self::Parsed(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            Self::Parsed(value) => ParseOutcome::Parsed(f(value)),
            Self::Degraded { value, issues } => ParseOutcome::Degraded {
                value: f(value),
                issues,
            },
            Self::Failed(failure) => ParseOutcome::Failed(failure),
        }
    }
}

/// Strip a markdown code fence, with or without a language tag.
///
/// Text without a fence is returned trimmed. Prose before the opening fence
/// and after the closing fence is discarded.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[open + 3..];
    let body = match after_open.find('\n') {
        Some(newline) if is_language_tag(&after_open[..newline]) => &after_open[newline + 1..],
        _ => strip_inline_tag(after_open),
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `json{"a": 1}` -> `{"a": 1}`. Anything else is returned as is.
fn strip_inline_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    match body[tag_len..].chars().next() {
        Some('{' | '[') if tag_len > 0 => &body[tag_len..],
        _ => body,
    }
}

/// Parse fenced-or-bare JSON.
pub fn parse_json(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(strip_code_fences(raw))
}

/// Parse JSON, falling back to the first brace-delimited substring of `raw`.
///
/// Returns the value and whether the fallback was needed.
pub fn parse_json_lenient(raw: &str) -> Result<(Value, bool), serde_json::Error> {
    let direct_error = match parse_json(raw) {
        Ok(value) => return Ok((value, false)),
        Err(e) => e,
    };

    match braced_span(raw) {
        Some(span) => serde_json::from_str(span).map(|value| (value, true)),
        None => Err(direct_error),
    }
}

/// First `{` through last `}`.
fn braced_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Accept an object, or a one-element array holding an object.
pub fn into_single_object(value: Value) -> StepResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(mut items) if items.len() == 1 => match items.pop() {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(shape_failure(&other, "one-element array of non-object")),
            None => Err(shape_failure(&Value::Null, "empty array")),
        },
        Value::Array(items) => Err(StepFailure::parse(
            "LLM output failed validation/parsing",
            format!("expected one JSON object, got an array of {}", items.len()),
        )),
        other => Err(shape_failure(&other, "top-level value is not an object")),
    }
}

fn shape_failure(value: &Value, what: &str) -> StepFailure {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    StepFailure::parse(
        "LLM output failed validation/parsing",
        format!("{what} (found {kind})"),
    )
}
