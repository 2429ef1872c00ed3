//! Shared types used across all modules.
//!
//! Repository identity, operations, file descriptors, artifacts and bug
//! findings live here. Other modules import from here rather than reaching
//! into each other's internals.

pub mod artifact;
pub mod finding;
pub mod language;
pub mod operation;
pub mod repo;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use artifact::{Artifact, ArtifactSet, FileReport, RepoDocument};
pub use finding::{BugFinding, BugSeverity, ExternalReference};
pub use language::{FileDescriptor, Language};
pub use operation::{FileOperation, Namespace, Operation, Scope};
pub use repo::{RepositoryRef, RepositoryVersion};

/// Supported LLM provider backends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderName {
    Anthropic,
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAI,
    Cohere,
    #[default]
    Gemini,
    Perplexity,
    #[serde(rename = "deepseek")]
    #[strum(serialize = "deepseek")]
    DeepSeek,
    #[serde(rename = "xai")]
    #[strum(serialize = "xai")]
    XAI,
    Groq,
    /// Any OpenAI-compatible API (e.g. Ollama, Together, local servers).
    #[serde(rename = "openai-compatible")]
    #[strum(serialize = "openai-compatible")]
    OpenAICompatible,
}

impl ProviderName {
    /// Provider-specific environment variable holding the API key.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Cohere => "COHERE_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::Perplexity => "PERPLEXITY_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::XAI => "XAI_API_KEY",
            ProviderName::Groq => "GROQ_API_KEY",
        }
    }
}
