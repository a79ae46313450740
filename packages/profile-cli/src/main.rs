//! Faculty profile extractor.
//!
//! Loads a JSON list of profile URLs, runs each one through the extraction
//! pipeline, then writes the profiles and an error report as CSV.

mod config;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, LogSettings};
use llm_client::ChatClient;
use profile_extraction::{
    install_signal_handler, load_urls, save_results, BatchMetrics, BatchRunner, ChatModel,
    HttpFetcher, Pipeline, ResourceGuard,
};

#[derive(Debug, Parser)]
#[command(name = "profile-extractor", about = "Extract faculty profiles from university web pages")]
struct Args {
    /// JSON file holding an array of profile URLs
    #[arg(short, long, default_value = "data/uidaho_urls.json")]
    input: PathBuf,

    /// Output directory (overrides OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only process the first N URLs
    #[arg(short, long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let log_guard = init_tracing(&LogSettings::from_env());

    let code = match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    };

    log_guard.release();
    code
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;
    info!(environment = %config.environment, model = %config.model_name, "starting profile extractor");

    let mut urls = load_urls(&args.input)
        .with_context(|| format!("failed to load URLs from {}", args.input.display()))?;
    if let Some(limit) = args.limit {
        urls.truncate(limit);
        info!(limit, "processing a limited number of URLs");
    }
    if urls.is_empty() {
        warn!("no URLs to process");
        return Ok(());
    }

    let pipeline_config = config.pipeline_config();
    let fetcher = HttpFetcher::new(pipeline_config.fetch.clone())
        .context("failed to build HTTP client")?;
    let client = ChatClient::new(&config.google_api_key)
        .with_base_url(&config.llm_base_url)
        .with_timeout(config.request_timeout)
        .context("failed to build LLM client")?;
    let pipeline = Pipeline::new(fetcher, ChatModel::new(client), pipeline_config)
        .context("invalid pipeline configuration")?;
    let runner = BatchRunner::new(pipeline);

    let cancel = CancellationToken::new();
    let signals = install_signal_handler(cancel.clone());

    let outcome = runner.run(&urls, &cancel).await;
    signals.abort();

    if outcome.interrupted {
        warn!(
            processed = outcome.results.len(),
            total = urls.len(),
            "run interrupted, saving partial results"
        );
    }

    let output_dir = args.output_dir.unwrap_or(config.output_dir);
    let filename = config.output_filename;
    let results = outcome.results;

    let saved = tokio::task::spawn_blocking(move || {
        BatchMetrics::aggregate(&results).log_summary();
        save_results(&output_dir, &filename, &results)
    })
    .await
    .context("bookkeeping task failed")?;

    // Saving is best-effort: a failure here does not change the exit code.
    if let Err(e) = saved {
        error!(error = %e, "failed to save results");
    }

    Ok(())
}

/// Console logging plus an optional timestamped log file.
///
/// The returned guard syncs the log file to disk when released.
fn init_tracing(settings: &LogSettings) -> ResourceGuard {
    let file = if settings.log_to_file {
        match open_log_file(&settings.log_file_path, Local::now()) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("file logging disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let sync_handle = file.as_ref().and_then(|f| f.try_clone().ok());
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,profile_extraction=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    ResourceGuard::new("log file", move || {
        if let Some(file) = sync_handle {
            sync_log_file(&file);
        }
    })
}

/// Flush the log file to disk. The subscriber may be gone by now, so
/// failures go to stderr like the other file-logging errors.
fn sync_log_file(file: &File) -> bool {
    match file.sync_all() {
        Ok(()) => true,
        Err(e) => {
            eprintln!("failed to sync log file: {e}");
            false
        }
    }
}

fn open_log_file(path: &Path, now: DateTime<Local>) -> Result<File> {
    let path = timestamped_log_path(path, now);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    File::create(&path).with_context(|| format!("failed to open log file {}", path.display()))
}

/// `logs/app.log` -> `logs/app_20250101_120000.log`.
fn timestamped_log_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string());
    let stamp = now.format("%Y%m%d_%H%M%S");
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{stamp}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_timestamped_log_path() {
        assert_eq!(
            timestamped_log_path(Path::new("logs/app.log"), noon()),
            PathBuf::from("logs/app_20250101_120000.log")
        );
        assert_eq!(
            timestamped_log_path(Path::new("run"), noon()),
            PathBuf::from("run_20250101_120000")
        );
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("nested/logs/app.log");

        open_log_file(&requested, noon()).unwrap();
        assert!(dir.path().join("nested/logs/app_20250101_120000.log").exists());
    }

    #[test]
    fn test_sync_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = open_log_file(&dir.path().join("app.log"), noon()).unwrap();
        assert!(sync_log_file(&file));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["profile-extractor"]);
        assert_eq!(args.input, PathBuf::from("data/uidaho_urls.json"));
        assert!(args.output_dir.is_none());
        assert!(args.limit.is_none());

        let args = Args::parse_from(["profile-extractor", "--limit", "5", "-o", "out"]);
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }
}
