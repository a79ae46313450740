//! Integration tests for the per-URL pipeline.
//!
//! These drive the full state machine with mock collaborators:
//! 1. Fetch canned HTML
//! 2. Preprocess it for real
//! 3. Extract and judge with canned LLM output
//! 4. Check the terminal state

use profile_extraction::{
    metric_keys,
    testing::{MockFetcher, MockLanguageModel, PromptKind},
    FailureKind, Pipeline, PipelineConfig, Stage, StepFailure, TokenUsage, ValidationStatus,
};
use serde_json::json;

const URL: &str = "https://www.uidaho.edu/cals/people/ann-lee";

const PROFILE_HTML: &str = r#"<html>
<head><title>Ann Lee | University of Idaho</title></head>
<body>
  <header>University of Idaho</header>
  <nav>Home | People | Research</nav>
  <main>
    <div class="profile-photo"><img src="/-/media/people/ann-lee.jpg" alt="Ann Lee"></div>
    <h1>Ann M. Lee, Ph.D.</h1>
    <p>Professor, Department of Soil and Water Systems</p>
    <p>College of Agricultural and Life Sciences</p>
    <p>Office: Ag Sci 242 | Phone: 208-885-0000 | Email: alee@uidaho.edu</p>
    <h2>Education</h2>
    <ul><li>Ph.D., Soil Science, MIT, 2019</li></ul>
    <h2>Research Focus</h2>
    <ul><li>Soil hydrology</li><li>Nutrient cycling</li></ul>
  </main>
  <footer>Moscow, Idaho</footer>
</body>
</html>"#;

fn extraction_json() -> String {
    json!({
        "first_name": "Ann",
        "middle_name": "M.",
        "last_name": "Lee",
        "title": "Professor",
        "office": "Ag Sci 242",
        "phone": "208-885-0000",
        "email": "alee@uidaho.edu",
        "college_unit": "College of Agricultural and Life Sciences",
        "department_division": "Department of Soil and Water Systems",
        "degrees": [{"degree_type": "Ph.D.", "institution": "MIT", "year": 2019}],
        "research_focus_areas": ["Soil hydrology", "Nutrient cycling"],
        "photo_url": "https://cdn.example.com/guess.jpg",
        "source_url": "https://somewhere-else.example/"
    })
    .to_string()
}

fn judge_json(status: &str) -> String {
    let mut map = serde_json::Map::new();
    for field in profile_extraction::VERDICT_FIELDS {
        map.insert(format!("{field}_status"), json!(status));
    }
    map.insert("overall_comment".into(), json!("Matches the page."));
    serde_json::Value::Object(map).to_string()
}

fn pipeline(fetcher: MockFetcher, llm: MockLanguageModel) -> Pipeline<MockFetcher, MockLanguageModel> {
    Pipeline::new(fetcher, llm, PipelineConfig::default()).unwrap()
}

#[tokio::test]
async fn test_happy_path_reaches_done() {
    let llm = MockLanguageModel::new()
        .with_extraction_usage(extraction_json(), TokenUsage::new(900, 150))
        .with_judgement(judge_json("Correct"));
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Done);
    assert!(state.error().is_none());
    assert!(state.correlation_id().starts_with("profile-thread-"));

    let profile = state.extracted().unwrap();
    assert_eq!(profile.full_name().as_deref(), Some("Ann M. Lee"));
    assert_eq!(profile.degrees_line(), "Ph.D., MIT, 2019");

    let verdict = state.validation().unwrap();
    assert_eq!(verdict.count(ValidationStatus::Correct), 12);
    assert_eq!(verdict.overall_comment.as_deref(), Some("Matches the page."));

    let metrics = state.metrics();
    assert_eq!(metrics.get(metric_keys::EXTRACTION_INPUT_TOKENS), Some(900.0));
    assert_eq!(metrics.get(metric_keys::EXTRACTION_OUTPUT_TOKENS), Some(150.0));
    assert!(metrics.get(metric_keys::EXTRACTION_COST).unwrap() > 0.0);
    // No usage on the judge reply, so the tokenizer estimate is used.
    assert!(metrics.get(metric_keys::VALIDATION_INPUT_TOKENS).unwrap() > 0.0);
    for key in metric_keys::TIME_KEYS {
        assert!(metrics.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn test_source_url_and_photo_come_from_the_page() {
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_judgement(judge_json("Correct"));
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;
    let profile = state.extracted().unwrap();

    assert_eq!(profile.source_url, URL);
    assert_eq!(
        profile.photo_url.as_deref(),
        Some("https://www.uidaho.edu/-/media/people/ann-lee.jpg")
    );
}

#[tokio::test]
async fn test_numeric_degree_year_becomes_string() {
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_judgement(judge_json("Correct"));
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;
    assert_eq!(
        state.extracted().unwrap().degrees[0].year.as_deref(),
        Some("2019")
    );
}

#[tokio::test]
async fn test_fenced_extraction_output() {
    let fenced = "```json\n{\"first_name\": \"Ann\"}\n```";
    let llm = MockLanguageModel::new()
        .with_extraction(fenced)
        .with_judgement(judge_json("Correct"));
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;
    assert_eq!(state.stage(), Stage::Done);
    assert_eq!(state.extracted().unwrap().first_name.as_deref(), Some("Ann"));
}

#[tokio::test]
async fn test_fetch_failure_is_sticky() {
    let fetcher = MockFetcher::new().fail_url(URL, StepFailure::http(503, "503 Service Unavailable"));
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_judgement(judge_json("Correct"));
    let pipeline = pipeline(fetcher, llm.clone());

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(state.error(), Some("HTTP 503 fetching URL"));
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::Http);
    assert_eq!(detail.status_code, Some(503));
    assert_eq!(detail.stage.as_deref(), Some("fetch"));

    assert!(state.extracted().is_none());
    assert!(state.validation().is_none());
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_empty_page_text_fails_without_llm_call() {
    let llm = MockLanguageModel::new().with_extraction(extraction_json());
    let fetcher = MockFetcher::new().with_page(URL, "<html><body>   <nav>only nav</nav> </body></html>");
    let pipeline = pipeline(fetcher, llm.clone());

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(state.error_detail().unwrap().kind, FailureKind::Parse);
    assert_eq!(llm.call_count(PromptKind::Extract), 0);
}

#[tokio::test]
async fn test_unparseable_extraction_keeps_raw_response() {
    let llm = MockLanguageModel::new().with_extraction("I could not find a profile here.");
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm.clone());

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::Parse);
    assert_eq!(detail.stage.as_deref(), Some("extract"));
    assert_eq!(
        detail.raw_response.as_deref(),
        Some("I could not find a profile here.")
    );
    assert_eq!(llm.call_count(PromptKind::Judge), 0);
}

#[tokio::test]
async fn test_extraction_api_error_is_upstream_failure() {
    let llm = MockLanguageModel::new().with_api_error(PromptKind::Extract, 429, "quota exceeded");
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(state.error(), Some("LLM API request failed"));
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::UpstreamApi);
    assert_eq!(detail.status_code, Some(429));
}

#[tokio::test]
async fn test_judge_key_drift_defaults_missing_fields() {
    let drifted = json!({
        "firstName": "correct",
        "LAST-NAME-STATUS": "N/A",
        "email_status": "Incorrect",
        "confidence": 0.9
    })
    .to_string();
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_judgement(drifted);
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Done);
    assert!(state.error().is_none());
    let verdict = state.validation().unwrap();
    assert_eq!(verdict.first_name_status, ValidationStatus::Correct);
    assert_eq!(verdict.last_name_status, ValidationStatus::NotApplicable);
    assert_eq!(verdict.email_status, ValidationStatus::Incorrect);
    assert_eq!(verdict.phone_status, ValidationStatus::NotApplicable);
}

#[tokio::test]
async fn test_judge_failure_still_counts_as_success() {
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_judgement(json!({"verdict": "fine"}).to_string());
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Done);
    assert!(state.is_success());
    assert!(state.validation().is_none());
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::Schema);
    assert_eq!(detail.stage.as_deref(), Some("validate"));
}

#[tokio::test]
async fn test_panicking_step_becomes_unexpected_failure() {
    let pipeline = pipeline(MockFetcher::new().panic_on(URL), MockLanguageModel::new());

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::Unexpected);
    assert!(detail.message.contains("mock fetcher panicked"));
}

#[tokio::test]
async fn test_panicking_llm_becomes_unexpected_failure() {
    let llm = MockLanguageModel::new().with_panic(PromptKind::Extract, "model exploded");
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(
        state.error_detail().unwrap().stage.as_deref(),
        Some("extract")
    );
    assert_eq!(state.error_detail().unwrap().message, "model exploded");
}

#[tokio::test]
async fn test_panicking_judge_still_reaches_done() {
    let llm = MockLanguageModel::new()
        .with_extraction(extraction_json())
        .with_panic(PromptKind::Judge, "judge exploded");
    let pipeline = pipeline(MockFetcher::new().with_page(URL, PROFILE_HTML), llm);

    let state = pipeline.process(URL).await;

    assert_eq!(state.stage(), Stage::Done);
    assert!(state.is_success());
    assert!(state.validation().is_none());
    let detail = state.error_detail().unwrap();
    assert_eq!(detail.kind, FailureKind::Unexpected);
    assert_eq!(detail.stage.as_deref(), Some("validate"));
}

#[tokio::test]
async fn test_panicking_extraction_writes_debug_dump() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_debug_dir(dir.path());
    let llm = MockLanguageModel::new().with_panic(PromptKind::Extract, "model exploded");
    let pipeline = Pipeline::new(
        MockFetcher::new().with_page(URL, PROFILE_HTML),
        llm,
        config,
    )
    .unwrap();

    let state = pipeline.process(URL).await;
    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(state.error_detail().unwrap().kind, FailureKind::Unexpected);

    let dumps: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(dumps.len(), 1);

    let dump: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&dumps[0]).unwrap()).unwrap();
    assert_eq!(dump["correlation_id"], state.correlation_id());
    assert_eq!(dump["error_detail"]["message"], "model exploded");
}

#[tokio::test]
async fn test_extraction_failure_writes_debug_dump() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_debug_dir(dir.path());
    let llm = MockLanguageModel::new().with_extraction("not json");
    let pipeline = Pipeline::new(
        MockFetcher::new().with_page(URL, PROFILE_HTML),
        llm,
        config,
    )
    .unwrap();

    let state = pipeline.process(URL).await;
    assert_eq!(state.stage(), Stage::Error);

    let dumps: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(dumps.len(), 1);
    assert!(dumps[0].to_string_lossy().ends_with("_ann-lee.json"));

    let dump: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&dumps[0]).unwrap()).unwrap();
    assert_eq!(dump["url"], URL);
    assert_eq!(dump["correlation_id"], state.correlation_id());
    assert_eq!(dump["error_detail"]["raw_response"], "not json");
}

#[tokio::test]
async fn test_fetch_failure_writes_no_dump() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_debug_dir(dir.path());
    let pipeline = Pipeline::new(MockFetcher::new(), MockLanguageModel::new(), config).unwrap();

    let state = pipeline.process(URL).await;
    assert_eq!(state.stage(), Stage::Error);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
