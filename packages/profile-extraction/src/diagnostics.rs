//! Write-only JSON dumps for failed extraction and validation steps.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ErrorDetail;
use crate::types::metrics::StepMetrics;
use crate::types::state::PipelineState;

#[derive(Debug, Serialize)]
struct DumpRecord<'a> {
    url: &'a str,
    correlation_id: &'a str,
    stage: &'a str,
    error: Option<&'a str>,
    error_detail: Option<&'a ErrorDetail>,
    metrics: &'a StepMetrics,
    dumped_at: String,
}

/// Writes one JSON file per failure under a debug directory.
///
/// Dumping is best-effort: I/O problems are logged and swallowed.
#[derive(Debug, Clone)]
pub struct DebugDumper {
    dir: PathBuf,
}

impl DebugDumper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Dump `state`. Returns the written path, or `None` if anything failed.
    pub async fn dump(&self, state: &PipelineState) -> Option<PathBuf> {
        let now = Utc::now();
        let record = DumpRecord {
            url: state.url(),
            correlation_id: state.correlation_id(),
            stage: state
                .error_detail()
                .and_then(|d| d.stage.as_deref())
                .unwrap_or(state.stage().as_str()),
            error: state.error(),
            error_detail: state.error_detail(),
            metrics: state.metrics(),
            dumped_at: now.to_rfc3339(),
        };

        let body = match serde_json::to_vec_pretty(&record) {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %state.url(), error = %e, "failed to serialize debug dump");
                return None;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "failed to create debug directory");
            return None;
        }

        let name = format!(
            "{}_{}.json",
            now.format("%Y%m%d_%H%M%S_%3f"),
            url_fragment(state.url())
        );
        let path = self.dir.join(name);

        match tokio::fs::write(&path, body).await {
            Ok(()) => {
                debug!(path = %path.display(), "wrote debug dump");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write debug dump");
                None
            }
        }
    }
}

/// Filesystem-safe tail of a URL: last path segment, else host.
pub fn url_fragment(url: &str) -> String {
    let tail = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let segment = parsed
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string);
            segment.or_else(|| parsed.host_str().map(str::to_string))
        })
        .unwrap_or_else(|| url.to_string());

    let safe: String = tail
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(50)
        .collect();

    if safe.is_empty() {
        "page".to_string()
    } else {
        safe
    }
}
