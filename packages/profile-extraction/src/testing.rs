//! Testing utilities including mock implementations.
//!
//! These drive the pipeline and batch runner without network or LLM calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::error::{LlmError, StepFailure, StepResult};
use crate::pipeline::prompts::{EXTRACT_SYSTEM_PROMPT, JUDGE_SYSTEM_PROMPT};
use crate::traits::fetcher::PageFetcher;
use crate::traits::llm::{Completion, CompletionRequest, LanguageModel, TokenUsage};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Language model
// ============================================================================

/// Which prompt a request carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Extract,
    Judge,
    Other,
}

impl PromptKind {
    pub fn of(request: &CompletionRequest) -> Self {
        if request.system == EXTRACT_SYSTEM_PROMPT {
            Self::Extract
        } else if request.system == JUDGE_SYSTEM_PROMPT {
            Self::Judge
        } else {
            Self::Other
        }
    }
}

/// A canned model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Content(Completion),
    Fail { status: Option<u16>, message: String },
    Panic(String),
}

impl MockReply {
    fn into_result(self) -> Result<Completion, LlmError> {
        match self {
            Self::Content(completion) => Ok(completion),
            Self::Fail {
                status: Some(status),
                message,
            } => Err(LlmError::Api { status, message }),
            Self::Fail {
                status: None,
                message,
            } => Err(LlmError::Network(message)),
            Self::Panic(message) => panic!("{message}"),
        }
    }
}

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockLlmCall {
    pub kind: PromptKind,
    pub model: String,
    pub user: String,
    pub temperature: f32,
}

/// A mock language model with per-prompt reply queues.
///
/// Replies are queued per [`PromptKind`]. The last reply in a queue repeats,
/// so one `with_extraction` covers a whole batch.
#[derive(Default, Clone)]
pub struct MockLanguageModel {
    replies: Arc<RwLock<HashMap<PromptKind, VecDeque<MockReply>>>>,
    calls: Arc<RwLock<Vec<MockLlmCall>>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a prompt kind.
    pub fn with_reply(self, kind: PromptKind, reply: MockReply) -> Self {
        write(&self.replies).entry(kind).or_default().push_back(reply);
        self
    }

    /// Queue extraction output.
    pub fn with_extraction(self, content: impl Into<String>) -> Self {
        self.with_reply(PromptKind::Extract, MockReply::Content(Completion::new(content)))
    }

    /// Queue extraction output with reported usage.
    pub fn with_extraction_usage(self, content: impl Into<String>, usage: TokenUsage) -> Self {
        self.with_reply(
            PromptKind::Extract,
            MockReply::Content(Completion::new(content).with_usage(usage)),
        )
    }

    /// Queue judge output.
    pub fn with_judgement(self, content: impl Into<String>) -> Self {
        self.with_reply(PromptKind::Judge, MockReply::Content(Completion::new(content)))
    }

    /// Queue an API error for a prompt kind.
    pub fn with_api_error(self, kind: PromptKind, status: u16, message: impl Into<String>) -> Self {
        self.with_reply(
            kind,
            MockReply::Fail {
                status: Some(status),
                message: message.into(),
            },
        )
    }

    /// Queue a panic for a prompt kind.
    pub fn with_panic(self, kind: PromptKind, message: impl Into<String>) -> Self {
        self.with_reply(kind, MockReply::Panic(message.into()))
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockLlmCall> {
        read(&self.calls).clone()
    }

    pub fn call_count(&self, kind: PromptKind) -> usize {
        read(&self.calls).iter().filter(|c| c.kind == kind).count()
    }

    fn next_reply(&self, kind: PromptKind) -> Option<MockReply> {
        let mut replies = write(&self.replies);
        let queue = replies.get_mut(&kind)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let kind = PromptKind::of(request);
        write(&self.calls).push(MockLlmCall {
            kind,
            model: request.model.clone(),
            user: request.user.clone(),
            temperature: request.temperature,
        });

        match self.next_reply(kind) {
            Some(reply) => reply.into_result(),
            None => Err(LlmError::Config(format!(
                "no mock reply configured for {kind:?} prompt"
            ))),
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// A mock fetcher serving canned pages.
///
/// Unknown URLs get the default page if one is set, otherwise a 404.
#[derive(Default, Clone)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    default_page: Option<String>,
    failures: Arc<RwLock<HashMap<String, StepFailure>>>,
    panics: Arc<RwLock<Vec<String>>>,
    cancel_after: Option<(usize, CancellationToken)>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        write(&self.pages).insert(url.into(), html.into());
        self
    }

    /// Serve `html` for any URL without its own page.
    pub fn with_default_page(mut self, html: impl Into<String>) -> Self {
        self.default_page = Some(html.into());
        self
    }

    /// Fail `url` with `failure`.
    pub fn fail_url(self, url: impl Into<String>, failure: StepFailure) -> Self {
        write(&self.failures).insert(url.into(), failure);
        self
    }

    /// Panic while fetching `url`.
    pub fn panic_on(self, url: impl Into<String>) -> Self {
        write(&self.panics).push(url.into());
        self
    }

    /// Cancel `token` once `count` fetches have happened.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    /// URLs fetched, in order.
    pub fn calls(&self) -> Vec<String> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> StepResult<String> {
        let fetched = {
            let mut calls = write(&self.calls);
            calls.push(url.to_string());
            calls.len()
        };

        if let Some((count, token)) = &self.cancel_after {
            if fetched >= *count {
                token.cancel();
            }
        }

        if read(&self.panics).iter().any(|u| u == url) {
            panic!("mock fetcher panicked on {url}");
        }

        if let Some(failure) = read(&self.failures).get(url) {
            return Err(failure.clone());
        }

        read(&self.pages)
            .get(url)
            .cloned()
            .or_else(|| self.default_page.clone())
            .ok_or_else(|| StepFailure::http(404, format!("404 Not Found for url: {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_reply_repeats() {
        let llm = MockLanguageModel::new()
            .with_extraction("first")
            .with_extraction("second");
        let request = CompletionRequest::new("m", EXTRACT_SYSTEM_PROMPT, "page");

        let replies: Vec<String> = [
            llm.complete(&request).await.unwrap().content,
            llm.complete(&request).await.unwrap().content,
            llm.complete(&request).await.unwrap().content,
        ]
        .into();
        assert_eq!(replies, ["first", "second", "second"]);
        assert_eq!(llm.call_count(PromptKind::Extract), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_kind_errors() {
        let llm = MockLanguageModel::new().with_extraction("{}");
        let request = CompletionRequest::new("m", JUDGE_SYSTEM_PROMPT, "page");

        assert!(matches!(
            llm.complete(&request).await,
            Err(LlmError::Config(_))
        ));
        assert_eq!(llm.calls()[0].kind, PromptKind::Judge);
    }

    #[tokio::test]
    async fn test_fetcher_pages_and_failures() {
        let fetcher = MockFetcher::new()
            .with_page("https://a.edu/1", "<p>one</p>")
            .fail_url("https://a.edu/2", StepFailure::timeout("slow"));

        assert_eq!(fetcher.fetch("https://a.edu/1").await.unwrap(), "<p>one</p>");
        assert_eq!(
            fetcher.fetch("https://a.edu/2").await.unwrap_err().summary,
            "Request timed out"
        );
        assert_eq!(
            fetcher.fetch("https://a.edu/3").await.unwrap_err().detail.status_code,
            Some(404)
        );
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fetcher_cancels_after_count() {
        let token = CancellationToken::new();
        let fetcher = MockFetcher::new()
            .with_default_page("<p>x</p>")
            .cancel_after(2, token.clone());

        fetcher.fetch("https://a.edu/1").await.unwrap();
        assert!(!token.is_cancelled());
        fetcher.fetch("https://a.edu/2").await.unwrap();
        assert!(token.is_cancelled());
    }
}
