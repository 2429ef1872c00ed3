//! Artifact generation.
//!
//! Turns one file's source into the artifact an operation asks for.
//! LLM-backed operations retry transient provider errors with exponential
//! backoff; anything that still fails degrades to an empty artifact so a
//! single bad file never fails a whole request.

pub mod license;
pub mod parse;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use crate::models::{Artifact, BugFinding, FileDescriptor, FileOperation, Language, RepoDocument};
use crate::providers::rig::{MAX_RETRIES, classify_error, is_retryable, retry_backoff};
use crate::providers::{LlmProvider, ProviderError};

pub use license::detect_license;
pub use parse::{clean_code_block, parse_bug_findings};

/// Marker appended when the docs source excerpt is cut.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]\n";

/// Produces artifacts from source text.
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_retries: u32,
    backoff: fn(u32) -> Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            max_retries: MAX_RETRIES,
            backoff: retry_backoff,
        }
    }

    /// Replace the retry schedule (tests use a zero backoff).
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: fn(u32) -> Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Produce the artifact for `op`. Never fails; failures degrade to empty.
    pub async fn generate(&self, op: FileOperation, code: &str, language: Language) -> Artifact {
        match op {
            FileOperation::GenerateTests => {
                let text = self.complete_text(&prompts::test_cases(code, language)).await;
                Artifact::TestCases(text)
            }
            FileOperation::GenerateMocks => {
                let text = self.complete_text(&prompts::mock_data(code, language)).await;
                Artifact::MockData(text)
            }
            FileOperation::DetectBugs => Artifact::BugReport(self.detect_bugs(code, language).await),
            FileOperation::LicenseScan => Artifact::License(detect_license(code)),
            FileOperation::FetchFullCode => Artifact::Content(code.to_string()),
        }
    }

    /// Bug findings for one file, empty on any provider or parse failure.
    pub async fn detect_bugs(&self, code: &str, language: Language) -> Vec<BugFinding> {
        let response = match self.complete(&prompts::bug_report(code, language)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "bug detection failed, reporting no findings");
                return Vec::new();
            }
        };
        match parse_bug_findings(&response) {
            Ok(findings) => findings,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable bug report, reporting no findings");
                Vec::new()
            }
        }
    }

    /// Documentation for a set of files, sources cut to `char_budget`.
    pub async fn generate_docs(
        &self,
        repo_name: &str,
        files: &[(FileDescriptor, String)],
        char_budget: usize,
    ) -> RepoDocument {
        let (sources, included, truncated) = assemble_sources(files, char_budget);
        let markdown = self
            .complete_text(&prompts::repo_docs(repo_name, &sources, truncated))
            .await;
        RepoDocument {
            markdown,
            files: included,
            truncated,
        }
    }

    async fn complete_text(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(text) => clean_code_block(&text),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, returning empty artifact");
                String::new()
            }
        }
    }

    /// One completion with timeout and retry on transient errors.
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(
                self.timeout,
                self.provider.complete(prompts::SYSTEM_PROMPT, prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = (self.backoff)(attempt);
                    tracing::warn!(
                        reason = classify_error(&e).unwrap_or("transient error"),
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "retrying LLM call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Concatenate sources under `=== path (language) ===` headers, up to
/// `budget` characters.
///
/// Returns the text, the paths that made it in (fully or partly), and
/// whether anything was cut.
fn assemble_sources(files: &[(FileDescriptor, String)], budget: usize) -> (String, Vec<String>, bool) {
    let mut out = String::new();
    let mut used = 0usize;
    let mut included = Vec::new();

    for (file, code) in files {
        let section = format!("=== {} ({}) ===\n{}\n\n", file.path, file.language, code);
        let len = section.chars().count();
        if used + len <= budget {
            out.push_str(&section);
            used += len;
            included.push(file.path.clone());
            continue;
        }

        let remaining = budget.saturating_sub(used);
        if remaining > 0 {
            out.extend(section.chars().take(remaining));
            included.push(file.path.clone());
        }
        out.push_str(TRUNCATION_MARKER);
        return (out, included, true);
    }

    (out, included, false)
}
