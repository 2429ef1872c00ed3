//! Q&A enrichment of bug findings.
//!
//! Each finding's `issue` text is searched on a Q&A site; the top questions
//! and their highest-voted answers become the finding's references. Any
//! failure leaves that finding with no references.

pub mod stackexchange;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BugFinding, ExternalReference};

pub use stackexchange::StackExchange;

/// Errors from the Q&A backend.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Q&A request failed: {0}")]
    Transport(String),

    #[error("Q&A API returned HTTP {0}")]
    Status(u16),

    #[error("unexpected Q&A response: {0}")]
    Payload(String),

    #[error("Q&A request timed out")]
    Timeout,
}

/// A question returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u64,
    pub title: String,
    pub link: String,
    pub score: i64,
}

/// A searchable Q&A site.
#[async_trait]
pub trait QaSearch: Send + Sync {
    /// Up to `max_results` questions relevant to `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Question>, EnrichError>;

    /// Body of the highest-voted answer to `question_id`, if any.
    async fn top_answer(&self, question_id: u64) -> Result<Option<String>, EnrichError>;
}

/// Attaches references to bug findings.
pub struct Enricher {
    search: Arc<dyn QaSearch>,
    max_results: usize,
    timeout: Duration,
}

impl Enricher {
    pub fn new(search: Arc<dyn QaSearch>, max_results: usize, timeout: Duration) -> Self {
        Self {
            search,
            max_results,
            timeout,
        }
    }

    /// Populate `references` on every finding. Never fails.
    pub async fn enrich(&self, findings: Vec<BugFinding>) -> Vec<BugFinding> {
        let mut out = Vec::with_capacity(findings.len());
        for mut finding in findings {
            finding.references = self.references_for(&finding.issue).await;
            out.push(finding);
        }
        out
    }

    async fn references_for(&self, issue: &str) -> Vec<ExternalReference> {
        let query = issue.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let questions = match tokio::time::timeout(self.timeout, self.search.search(query, self.max_results)).await {
            Ok(Ok(questions)) => questions,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "enrichment search failed, leaving references empty");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "enrichment search timed out");
                return Vec::new();
            }
        };

        let mut refs = Vec::with_capacity(questions.len());
        for q in questions.into_iter().take(self.max_results) {
            let answer = match tokio::time::timeout(self.timeout, self.search.top_answer(q.id)).await {
                Ok(Ok(answer)) => answer,
                Ok(Err(e)) => {
                    tracing::debug!(question = q.id, error = %e, "answer fetch failed");
                    None
                }
                Err(_) => {
                    tracing::debug!(question = q.id, "answer fetch timed out");
                    None
                }
            };
            refs.push(ExternalReference {
                title: q.title,
                link: q.link,
                score: q.score,
                answer,
            });
        }
        refs
    }
}
