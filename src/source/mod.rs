//! Upstream repository access.
//!
//! A [`SourceResolver`] turns `(owner, repo)` into a pinned
//! [`RepositoryVersion`], lists the supported files of that snapshot and
//! fetches their contents. [`CachedSource`] layers the result cache over
//! listing and content fetches; resolution itself always goes upstream so a
//! new commit is observed immediately.

pub mod github;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheEngine, CacheKey};
use crate::models::{FileDescriptor, Operation, RepositoryRef, RepositoryVersion, Scope};

pub use github::GitHubSource;

/// Errors talking to the upstream repository host.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Payload(String),

    #[error("request timed out: {0}")]
    Timeout(String),
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Read access to a hosted repository.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve the default branch head: branch → commit → tree.
    async fn resolve(&self, repo: &RepositoryRef) -> Result<RepositoryVersion, SourceError>;

    /// Supported source files of `version`, narrowed to `scope`.
    ///
    /// A file scope that names a missing or unsupported path yields an
    /// empty list, not an error.
    async fn list_files(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        scope: &Scope,
    ) -> Result<Vec<FileDescriptor>, SourceError>;

    /// Decoded UTF-8 content of `path` at `version`.
    async fn fetch_content(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        path: &str,
    ) -> Result<String, SourceError>;
}

/// Keep blobs with a supported extension, then apply `scope`.
pub fn filter_tree(entries: impl IntoIterator<Item = TreeEntry>, scope: &Scope) -> Vec<FileDescriptor> {
    let files = entries
        .into_iter()
        .filter(|e| e.kind == "blob")
        .filter_map(|e| FileDescriptor::for_path(e.path));
    apply_scope(files, scope)
}

/// Narrow a listing to `scope`: everything, or the single matching path.
pub fn apply_scope(files: impl IntoIterator<Item = FileDescriptor>, scope: &Scope) -> Vec<FileDescriptor> {
    match scope.file() {
        None => files.into_iter().collect(),
        Some(path) => files.into_iter().filter(|f| f.path == path).take(1).collect(),
    }
}

/// A resolver whose listings and file contents go through the cache.
pub struct CachedSource {
    inner: Arc<dyn SourceResolver>,
    cache: Arc<CacheEngine>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn SourceResolver>, cache: Arc<CacheEngine>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl SourceResolver for CachedSource {
    async fn resolve(&self, repo: &RepositoryRef) -> Result<RepositoryVersion, SourceError> {
        self.inner.resolve(repo).await
    }

    /// The whole listing is cached once per commit; scoped requests filter it.
    async fn list_files(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        scope: &Scope,
    ) -> Result<Vec<FileDescriptor>, SourceError> {
        let whole = Scope::Repository;
        let key = CacheKey::for_version(repo, version, Operation::ListFiles, whole.clone());
        let all = self
            .cache
            .get_or_compute(&key, || self.inner.list_files(repo, version, &whole))
            .await?;
        Ok(apply_scope(all.value, scope))
    }

    async fn fetch_content(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        path: &str,
    ) -> Result<String, SourceError> {
        let key = CacheKey::for_version(repo, version, Operation::FileContent, Scope::File(path.to_string()));
        let content = self
            .cache
            .get_or_compute(&key, || self.inner.fetch_content(repo, version, path))
            .await?;
        Ok(content.value)
    }
}
