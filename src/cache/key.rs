//! Structured cache keys.
//!
//! A key is `(owner, repo, commit_id, operation, scope)`. Its canonical
//! string form is `owner:repo:commit_id:operation[:scope]`, with every
//! segment escaped so that `:` inside a segment can never shift the
//! boundaries between segments.

use std::borrow::Cow;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::{Namespace, Operation, RepositoryRef, RepositoryVersion, Scope};

/// Address of one cached result.
///
/// The request credential is deliberately absent: two callers with
/// different tokens asking for the same thing share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    owner: String,
    repo: String,
    commit_id: String,
    operation: Operation,
    scope: Scope,
}

impl CacheKey {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        commit_id: impl Into<String>,
        operation: Operation,
        scope: Scope,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            commit_id: commit_id.into(),
            operation,
            scope,
        }
    }

    /// Key for `operation` on a resolved repository snapshot.
    pub fn for_version(
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        operation: Operation,
        scope: Scope,
    ) -> Self {
        Self::new(&repo.owner, &repo.repo, &version.commit_id, operation, scope)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }

    /// Storage partition for this key.
    pub fn namespace(&self) -> Namespace {
        self.operation.namespace()
    }

    /// Hex SHA-256 of the canonical form, used where the raw key is not a
    /// valid identifier (e.g. file names).
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            escape_segment(&self.owner),
            escape_segment(&self.repo),
            escape_segment(&self.commit_id),
            self.operation,
        )?;
        if let Scope::File(path) = &self.scope {
            write!(f, ":{}", escape_segment(path))?;
        }
        Ok(())
    }
}

/// Percent-escape the separator and the escape character itself.
fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains([':', '%']) {
        return Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 8);
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
