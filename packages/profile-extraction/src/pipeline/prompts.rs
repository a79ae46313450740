//! LLM prompts for extraction and judging.
//!
//! Both prompts forbid the model from supplying anything the page text does
//! not state.

use crate::types::profile::ProfileRecord;
use crate::types::verdict::VERDICT_FIELDS;

/// System prompt for the extraction call.
pub const EXTRACT_SYSTEM_PROMPT: &str = r#"You extract faculty profile information from university web page text.

Rules:
- Use ONLY the provided text. If a value is not stated, use null (or [] for lists).
- Never guess, infer or invent names, titles, contact details or degrees.
- Keep degrees and research areas in the order they appear.
- Years are strings, e.g. "2019".

Output a single JSON object with exactly these keys:
{
    "first_name": string | null,
    "middle_name": string | null,
    "last_name": string | null,
    "title": string | null,
    "office": string | null,
    "phone": string | null,
    "email": string | null,
    "college_unit": string | null,
    "department_division": string | null,
    "degrees": [{"degree_type": string, "institution": string | null, "year": string | null}],
    "research_focus_areas": [string],
    "photo_url": string | null
}"#;

/// System prompt for the judge call.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are an impartial evaluator. Compare each field of the Extracted Data against the Source Text, using ONLY the Source Text as ground truth.

For each field choose exactly one status:
- "Correct": the extracted value is present and accurate in the Source Text.
- "Incorrect": the extracted value is inaccurate, or does not appear in the Source Text at all.
- "Missing": the Source Text contains the information but the extraction left it empty.
- "Not Applicable": neither the Source Text nor the extraction has the information.

Output a single flat JSON object with one "<field>_status" key per field listed below, plus "overall_comment" (a short string)."#;

/// User message for the extraction call.
pub fn format_extract_prompt(page_text: &str) -> String {
    format!(
        "Extract the faculty profile details from the following text content:\n\n---\n{page_text}\n---"
    )
}

/// User message for the judge call.
pub fn format_judge_prompt(page_text: &str, extracted: &ProfileRecord) -> String {
    let fields = VERDICT_FIELDS
        .iter()
        .map(|f| format!("- {f}_status"))
        .collect::<Vec<_>>()
        .join("\n");

    // source_url is an input, not something the model extracted.
    let extracted_json = serde_json::to_value(extracted)
        .map(|mut value| {
            if let Some(map) = value.as_object_mut() {
                map.remove("source_url");
            }
            value
        })
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "Fields to evaluate:\n{fields}\n\nSource Text:\n---\n{page_text}\n---\n\nExtracted Data:\n---\n{extracted_json}\n---\n\nEvaluate the Extracted Data against the Source Text."
    )
}
