//! Page fetching seam.

use async_trait::async_trait;

use crate::error::StepResult;

/// Fetch one page's HTML.
///
/// Implementations classify their own failures into
/// [`StepFailure`](crate::error::StepFailure)s (timeout, HTTP status,
/// network) and never retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> StepResult<String>;
}
