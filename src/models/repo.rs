//! Repository identity and version types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a target repository for one request.
///
/// The credential is passed through opaquely to the upstream API and is
/// redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
    pub credential: String,
}

impl RepositoryRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            credential: credential.into(),
        }
    }

    /// `owner/repo` for log lines and API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Debug for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRef")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// An immutable snapshot of a repository branch.
///
/// `commit_id` is the version token embedded in every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryVersion {
    pub branch: String,
    pub commit_id: String,
    pub tree_id: String,
}
