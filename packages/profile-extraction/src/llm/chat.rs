use async_trait::async_trait;
use llm_client::{ChatClient, ChatClientError, ChatRequest};

use crate::error::LlmError;
use crate::traits::llm::{Completion, CompletionRequest, LanguageModel, TokenUsage};

/// Language model backed by an OpenAI-compatible chat endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use profile_extraction::llm::ChatModel;
///
/// let client = llm_client::ChatClient::new(api_key)
///     .with_base_url(llm_client::GEMINI_OPENAI_BASE_URL);
/// let llm = ChatModel::new(client);
/// ```
#[derive(Clone)]
pub struct ChatModel {
    client: ChatClient,
}

impl ChatModel {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }
}

#[async_trait]
impl LanguageModel for ChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let mut chat = ChatRequest::new(&request.model, &request.system, &request.user)
            .with_temperature(request.temperature);
        if request.json_mode {
            chat = chat.json_object();
        }

        let response = self.client.chat_completion(&chat).await.map_err(to_llm_error)?;

        let completion = Completion::new(response.content);
        Ok(match response.usage {
            Some(usage) => completion.with_usage(TokenUsage::new(
                u64::from(usage.prompt_tokens),
                u64::from(usage.completion_tokens),
            )),
            None => completion,
        })
    }
}

fn to_llm_error(error: ChatClientError) -> LlmError {
    match error {
        ChatClientError::Config(msg) => LlmError::Config(msg),
        ChatClientError::Network(msg) => LlmError::Network(msg),
        ChatClientError::Timeout(msg) => LlmError::Timeout(msg),
        ChatClientError::Api { status, message } => LlmError::Api { status, message },
        ChatClientError::Parse(msg) => LlmError::InvalidResponse(msg),
    }
}
