//! [`LanguageModel`](crate::traits::llm::LanguageModel) implementations.

#[cfg(feature = "openai-compat")]
mod chat;

#[cfg(feature = "openai-compat")]
pub use chat::ChatModel;
