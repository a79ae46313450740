//! Trait abstractions for the pipeline's external collaborators.
//!
//! Applications provide a [`fetcher::PageFetcher`] and a
//! [`llm::LanguageModel`]; the pipeline owns everything in between.

pub mod fetcher;
pub mod llm;
