//! LlmProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core to decouple the
//! codebase from the specific LLM library.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the LLM provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
}

/// A text-completion backend.
///
/// Implementations return the model's raw response; cleaning and parsing
/// happen in the generator.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one system/user prompt pair and return the response text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}
