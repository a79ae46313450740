//! Configuration types for fetching, preprocessing and the LLM steps.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser-like user agent; many university CMSes reject bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Default model for both the extractor and the judge.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for page fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Sleep before every request. Default: 2s.
    pub politeness_delay: Duration,

    /// Bound on a single request. Default: 30s.
    pub timeout: Duration,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Selector heuristics for turning HTML into page text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Tags removed wholesale before text extraction
    pub boilerplate_tags: Vec<String>,

    /// Main-content candidates, tried in order; `<body>` is the fallback
    pub content_selectors: Vec<String>,

    /// Photo candidates, tried in order
    pub photo_selectors: Vec<String>,

    /// Text shorter than this is logged as suspicious. Default: 100.
    pub short_text_threshold: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            boilerplate_tags: ["script", "style", "header", "footer", "nav", "aside", "form"]
                .map(String::from)
                .to_vec(),
            content_selectors: ["main", "article", ".content", "#main", "#content"]
                .map(String::from)
                .to_vec(),
            photo_selectors: [".profile-photo img", ".faculty-photo img", ".headshot img"]
                .map(String::from)
                .to_vec(),
            short_text_threshold: 100,
        }
    }
}

impl PreprocessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_selectors(mut self, selectors: Vec<String>) -> Self {
        self.content_selectors = selectors;
        self
    }

    pub fn with_photo_selectors(mut self, selectors: Vec<String>) -> Self {
        self.photo_selectors = selectors;
        self
    }
}

/// Model settings for one LLM step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
        }
    }
}

impl LlmSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Everything the per-URL pipeline needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub preprocess: PreprocessConfig,

    /// Extraction call
    pub extraction: LlmSettings,

    /// Judge call
    pub judge: LlmSettings,

    /// Where failure dumps go. `None` disables them.
    pub debug_dir: Option<PathBuf>,

    /// Prefix for per-URL correlation ids
    pub correlation_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            preprocess: PreprocessConfig::default(),
            extraction: LlmSettings::default(),
            judge: LlmSettings::default(),
            debug_dir: None,
            correlation_prefix: "profile-thread".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_extraction(mut self, settings: LlmSettings) -> Self {
        self.extraction = settings;
        self
    }

    pub fn with_judge(mut self, settings: LlmSettings) -> Self {
        self.judge = settings;
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn with_correlation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.correlation_prefix = prefix.into();
        self
    }

    /// Fresh correlation id: `<prefix>-<uuid>`.
    pub fn next_correlation_id(&self) -> String {
        format!("{}-{}", self.correlation_prefix, uuid::Uuid::new_v4())
    }
}
