//! Request orchestration: validation, resolution, cache, parallel generation.
//!
//! Every request resolves the repository's current head first, so the
//! commit id in the cache key always reflects the latest push. On a miss,
//! per-file work fans out over a [`JoinSet`] bounded by a [`Semaphore`];
//! the aggregate is stored only once every file has finished or been
//! skipped.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::cache::{CacheEngine, CacheKey, Cached};
use crate::enrich::Enricher;
use crate::generator::Generator;
use crate::models::{
    Artifact, ArtifactSet, FileDescriptor, FileOperation, FileReport, Operation, RepoDocument,
    RepositoryRef, RepositoryVersion, Scope,
};
use crate::source::{CachedSource, SourceError, SourceResolver};

/// Errors that fail a whole request.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] SourceError),
}

impl RequestError {
    /// Machine-readable error class.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::InvalidInput(_) => "invalid_input",
            RequestError::Upstream(_) => "upstream",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        }
    }
}

/// Failure payload returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// A caller's request: which repository, with what token, how much of it.
#[derive(Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub owner: String,
    pub repo: String,
    pub credential: String,
    /// A repo-relative path; `None` means the whole repository.
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("credential", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl GenerationRequest {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            credential: credential.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, path: impl Into<String>) -> Self {
        self.scope = Some(path.into());
        self
    }

    /// Check required fields before any network call.
    pub fn validate(&self) -> Result<(RepositoryRef, Scope), RequestError> {
        let missing: Vec<&str> = [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("credential", &self.credential),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(RequestError::InvalidInput(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let repo = RepositoryRef::new(self.owner.trim(), self.repo.trim(), self.credential.trim());
        Ok((repo, Scope::from_path(self.scope.as_deref())))
    }
}

/// Process-wide service state, built once and shared.
pub struct Orchestrator {
    source: Arc<dyn SourceResolver>,
    generator: Arc<Generator>,
    enricher: Option<Arc<Enricher>>,
    cache: Arc<CacheEngine>,
    max_concurrent: usize,
    docs_char_budget: usize,
}

impl Orchestrator {
    /// `source` is wrapped so listings and file contents share the cache.
    pub fn new(source: Arc<dyn SourceResolver>, generator: Generator, cache: Arc<CacheEngine>) -> Self {
        let source = Arc::new(CachedSource::new(source, Arc::clone(&cache)));
        Self {
            source,
            generator: Arc::new(generator),
            enricher: None,
            cache,
            max_concurrent: 4,
            docs_char_budget: 60_000,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_docs_char_budget(mut self, budget: usize) -> Self {
        self.docs_char_budget = budget;
        self
    }

    /// Supported files at the current head, narrowed to the request scope.
    pub async fn list_files(&self, request: &GenerationRequest) -> Result<Vec<FileDescriptor>, RequestError> {
        let (repo, scope) = request.validate()?;
        let span = request_span(&repo, Operation::ListFiles);
        async {
            let version = self.source.resolve(&repo).await?;
            let files = self.source.list_files(&repo, &version, &scope).await?;
            tracing::info!(commit = %version.commit_id, files = files.len(), "listed files");
            Ok::<_, RequestError>(files)
        }
        .instrument(span)
        .await
    }

    /// Run a per-file operation over the request scope.
    pub async fn run(
        &self,
        op: FileOperation,
        request: &GenerationRequest,
    ) -> Result<Cached<ArtifactSet>, RequestError> {
        let (repo, scope) = request.validate()?;
        let span = request_span(&repo, op.into());
        async {
            tracing::info!(scope = ?scope, "request started");
            let version = self.source.resolve(&repo).await?;
            let key = CacheKey::for_version(&repo, &version, op.into(), scope.clone());

            let result = self
                .cache
                .get_or_compute(&key, || self.compute_artifacts(op, &repo, &version, &scope))
                .await?;

            tracing::info!(
                commit = %version.commit_id,
                files = result.value.len(),
                cache_hit = result.is_hit(),
                "request finished"
            );
            Ok::<_, RequestError>(result)
        }
        .instrument(span)
        .await
    }

    /// README-style documentation for the request scope.
    pub async fn repo_docs(&self, request: &GenerationRequest) -> Result<Cached<RepoDocument>, RequestError> {
        let (repo, scope) = request.validate()?;
        let span = request_span(&repo, Operation::RepoDocs);
        async {
            tracing::info!(scope = ?scope, "request started");
            let version = self.source.resolve(&repo).await?;
            let key = CacheKey::for_version(&repo, &version, Operation::RepoDocs, scope.clone());

            let result = self
                .cache
                .get_or_compute(&key, || self.compute_docs(&repo, &version, &scope))
                .await?;

            tracing::info!(
                commit = %version.commit_id,
                cache_hit = result.is_hit(),
                truncated = result.value.truncated,
                "request finished"
            );
            Ok::<_, RequestError>(result)
        }
        .instrument(span)
        .await
    }

    async fn compute_artifacts(
        &self,
        op: FileOperation,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        scope: &Scope,
    ) -> Result<ArtifactSet, RequestError> {
        let files = self.source.list_files(repo, version, scope).await?;

        let source = Arc::clone(&self.source);
        let generator = Arc::clone(&self.generator);
        let enricher = self.enricher.clone();
        let repo = repo.clone();
        let version = version.clone();

        let results = self
            .for_each_file(files, move |file| {
                let source = Arc::clone(&source);
                let generator = Arc::clone(&generator);
                let enricher = enricher.clone();
                let repo = repo.clone();
                let version = version.clone();
                async move {
                    let code = fetch_or_skip(source.as_ref(), &repo, &version, &file.path).await?;
                    let mut artifact = generator.generate(op, &code, file.language).await;
                    if let (Artifact::BugReport(findings), Some(enricher)) = (&mut artifact, &enricher) {
                        *findings = enricher.enrich(std::mem::take(findings)).await;
                    }
                    Some(artifact)
                }
            })
            .await;

        Ok(results
            .into_iter()
            .map(|(file, artifact)| {
                let report = FileReport {
                    language: file.language,
                    artifact,
                };
                (file.path, report)
            })
            .collect())
    }

    async fn compute_docs(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        scope: &Scope,
    ) -> Result<RepoDocument, RequestError> {
        let files = self.source.list_files(repo, version, scope).await?;

        let source = Arc::clone(&self.source);
        let repo_owned = repo.clone();
        let version_owned = version.clone();
        let sources = self
            .for_each_file(files, move |file| {
                let source = Arc::clone(&source);
                let repo = repo_owned.clone();
                let version = version_owned.clone();
                async move { fetch_or_skip(source.as_ref(), &repo, &version, &file.path).await }
            })
            .await;

        Ok(self
            .generator
            .generate_docs(&repo.full_name(), &sources, self.docs_char_budget)
            .await)
    }

    /// Run `task` for every file with at most `max_concurrent` in flight.
    ///
    /// Files whose task yields `None` are dropped. Output is sorted by path.
    async fn for_each_file<T, F, Fut>(&self, files: Vec<FileDescriptor>, task: F) -> Vec<(FileDescriptor, T)>
    where
        T: Send + 'static,
        F: Fn(FileDescriptor) -> Fut,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for file in files {
            let sem = Arc::clone(&semaphore);
            let work = task(file.clone());
            join_set.spawn(
                async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return None;
                    };
                    work.await.map(|value| (file, value))
                }
                .in_current_span(),
            );
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(item)) => results.push(item),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "file task panicked, skipping"),
            }
        }
        results.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        results
    }
}

async fn fetch_or_skip(
    source: &dyn SourceResolver,
    repo: &RepositoryRef,
    version: &RepositoryVersion,
    path: &str,
) -> Option<String> {
    match source.fetch_content(repo, version, path).await {
        Ok(code) => Some(code),
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to fetch file, skipping");
            None
        }
    }
}

fn request_span(repo: &RepositoryRef, operation: Operation) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %uuid::Uuid::new_v4(),
        owner = %repo.owner,
        repo = %repo.repo,
        operation = %operation,
    )
}
