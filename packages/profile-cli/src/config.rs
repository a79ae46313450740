use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use profile_extraction::{FetchConfig, LlmSettings, PipelineConfig, DEFAULT_MODEL};

const DEFAULT_BASE_URL: &str = llm_client::GEMINI_OPENAI_BASE_URL;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub llm_base_url: String,
    pub model_name: String,
    pub llm_temperature: f32,
    pub judge_model_name: String,
    pub judge_temperature: f32,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub output_filename: String,
    pub debug_dir: PathBuf,
    pub thread_id_prefix: String,
    pub environment: String,
}

/// Logging settings, readable before the rest of the configuration so that
/// configuration errors are logged too.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub log_to_file: bool,
    pub log_file_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            google_api_key: lookup("GOOGLE_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .context("GOOGLE_API_KEY must be set")?,
            llm_base_url: text("LLM_BASE_URL", DEFAULT_BASE_URL),
            model_name: text("MODEL_NAME", DEFAULT_MODEL),
            llm_temperature: parse_var(&lookup, "LLM_TEMPERATURE", 0.1)?,
            judge_model_name: text("JUDGE_MODEL_NAME", DEFAULT_MODEL),
            judge_temperature: parse_var(&lookup, "JUDGE_TEMPERATURE", 0.1)?,
            request_delay: seconds(&lookup, "REQUEST_DELAY_SECONDS", 2.0)?,
            request_timeout: seconds(&lookup, "REQUEST_TIMEOUT_SECONDS", 30.0)?,
            output_dir: text("OUTPUT_DIR", "output").into(),
            output_filename: text("OUTPUT_FILENAME", "extracted_profiles.csv"),
            debug_dir: text("DEBUG_DIR", "debug").into(),
            thread_id_prefix: text("THREAD_ID_PREFIX", "profile-thread"),
            environment: text("ENVIRONMENT", "development"),
        })
    }

    /// Library configuration for the per-URL pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_fetch(
                FetchConfig::new()
                    .with_politeness_delay(self.request_delay)
                    .with_timeout(self.request_timeout),
            )
            .with_extraction(
                LlmSettings::new(&self.model_name).with_temperature(self.llm_temperature),
            )
            .with_judge(
                LlmSettings::new(&self.judge_model_name).with_temperature(self.judge_temperature),
            )
            .with_debug_dir(&self.debug_dir)
            .with_correlation_prefix(&self.thread_id_prefix)
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_to_file: lookup("LOG_TO_FILE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(true),
            log_file_path: lookup("LOG_FILE_PATH")
                .unwrap_or_else(|| "logs/app.log".to_string())
                .into(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: f64) -> Result<Duration> {
    let secs: f64 = parse_var(lookup, name, default)?;
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{name} must be a non-negative number of seconds"))
}
