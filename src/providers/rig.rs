//! rig-core integration for LLM completions.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::ProviderName;

use super::{LlmProvider, ProviderError};

/// Maximum tokens per LLM completion response.
///
/// Generated test suites for large files run long; Gemini defaults to a
/// much lower limit when none is sent.
const MAX_TOKENS: u64 = 16384;

/// Maximum number of retry attempts for transient API errors.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Build a single-turn agent from a rig-core client and prompt it.
macro_rules! prompt_simple {
    ($client:expr, $model:expr, $system:expr, $user:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .temperature(0.0)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($user)
            .await
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based completion provider.
///
/// The provider name in config selects which rig-core client is built;
/// a fresh client is created per call.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var(),
            )));
        }
        Ok(Self { config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_openai_client(
        &self,
        api_key: &str,
        base_url: Option<&str>,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            )
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }
}

#[async_trait]
impl LlmProvider for RigProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, model, system, prompt, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key, self.config.base_url.as_deref())?;
                prompt_simple!(client, model, system, prompt, "OpenAI")
            }
            ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key, Some(self.require_base_url()?))?;
                prompt_simple!(client, model, system, prompt, "OpenAI-compatible")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, model, system, prompt, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, model, system, prompt, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, model, system, prompt, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, model, system, prompt, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, model, system, prompt, "xAI")
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, model, system, prompt, "Groq")
            }
        }
    }
}

/// Check whether a provider error is transient and worth retrying.
///
/// Parse errors are never retried: the model tends to produce the same
/// malformed output again.
pub fn is_retryable(err: &ProviderError) -> bool {
    match err {
        ProviderError::ParseError(_) | ProviderError::NotConfigured(_) => false,
        ProviderError::Timeout(_) => true,
        ProviderError::ApiError(_) => classify_error(err).is_some(),
    }
}

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient errors, `None` otherwise.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    match err {
        ProviderError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
                || msg_lower.contains("resource_exhausted")
            {
                Some("Rate limited by API")
            } else if msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if msg_lower.contains("500") || msg_lower.contains("internal server error") {
                Some("Upstream server error")
            } else if msg_lower.contains("502") || msg_lower.contains("504") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        ProviderError::Timeout(_) => Some("Request timed out"),
        ProviderError::ParseError(_) => Some("Failed to parse LLM response"),
        ProviderError::NotConfigured(_) => None,
    }
}

/// Exponential backoff for retry `attempt` (0-based), capped at [`MAX_BACKOFF`].
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: ProviderName, api_key: Option<&str>, base_url: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name,
            model: "gemini-2.0-flash-lite".to_string(),
            base_url: base_url.map(String::from),
            api_key: api_key.map(String::from),
        }
    }

    #[test]
    fn new_provider_missing_api_key() {
        match RigProvider::new(config(ProviderName::Gemini, None, None)) {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("API key"), "got: {msg}");
                assert!(msg.contains("GEMINI_API_KEY"), "got: {msg}");
            }
            Ok(_) => panic!("expected error for missing API key"),
        }
    }

    #[test]
    fn new_provider_with_api_key() {
        let provider = RigProvider::new(config(ProviderName::Gemini, Some("key"), None)).unwrap();
        assert_eq!(provider.model(), "gemini-2.0-flash-lite");
    }

    #[test]
    fn require_base_url_missing() {
        let provider =
            RigProvider::new(config(ProviderName::OpenAICompatible, Some("key"), None)).unwrap();
        let err = provider.require_base_url().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn require_base_url_present() {
        let provider = RigProvider::new(config(
            ProviderName::OpenAICompatible,
            Some("key"),
            Some("http://localhost:11434/v1"),
        ))
        .unwrap();
        assert_eq!(provider.require_base_url().unwrap(), "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn openai_compatible_without_base_url_fails_before_network() {
        let provider =
            RigProvider::new(config(ProviderName::OpenAICompatible, Some("key"), None)).unwrap();
        let err = provider.complete("system", "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn retryable_429_rate_limit() {
        let err = ProviderError::ApiError(
            "Gemini API error: HttpError: Invalid status code 429 Too Many Requests".into(),
        );
        assert!(is_retryable(&err));
        assert_eq!(classify_error(&err), Some("Rate limited by API"));
    }

    #[test]
    fn retryable_5xx() {
        for msg in ["status 500", "503 Service Unavailable", "overloaded", "502 Bad Gateway"] {
            assert!(is_retryable(&ProviderError::ApiError(msg.into())), "{msg}");
        }
    }

    #[test]
    fn retryable_timeout_and_connection() {
        assert!(is_retryable(&ProviderError::Timeout(60)));
        assert!(is_retryable(&ProviderError::ApiError("connection reset".into())));
        assert!(is_retryable(&ProviderError::ApiError("operation timed out".into())));
    }

    #[test]
    fn not_retryable_auth_error() {
        let err = ProviderError::ApiError("401 Unauthorized: invalid API key".into());
        assert!(!is_retryable(&err));
        assert_eq!(classify_error(&err), None);
    }

    #[test]
    fn not_retryable_parse_or_config_error() {
        assert!(!is_retryable(&ProviderError::ParseError("bad json".into())));
        assert!(!is_retryable(&ProviderError::NotConfigured("no key".into())));
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        assert_eq!(retry_backoff(0), Duration::from_secs(2));
        assert_eq!(retry_backoff(1), Duration::from_secs(4));
        assert_eq!(retry_backoff(2), Duration::from_secs(8));
        assert_eq!(retry_backoff(3), Duration::from_secs(16));
        assert_eq!(retry_backoff(4), MAX_BACKOFF);
        assert_eq!(retry_backoff(40), MAX_BACKOFF);
    }
}
