//! GitHub REST API resolver.
//!
//! Resolution follows `repos/{o}/{r}` → `git/refs/heads/{branch}` →
//! `git/commits/{sha}`, then lists `git/trees/{tree}?recursive=1` and reads
//! blobs through `contents/{path}?ref={commit}`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{SourceError, SourceResolver, TreeEntry, filter_tree};
use crate::constants::{GITHUB_API_VERSION, USER_AGENT};
use crate::models::{FileDescriptor, RepositoryRef, RepositoryVersion, Scope};

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaObject,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ShaObject,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

/// Resolver backed by `api.github.com` or a GitHub Enterprise base URL.
pub struct GitHubSource {
    client: reqwest::Client,
    api_base: Url,
}

impl GitHubSource {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, SourceError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| SourceError::Transport(format!("invalid GitHub API base {api_base}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base })
    }

    /// `{api_base}/repos/{owner}/{repo}/{rest...}` with each segment encoded.
    fn repo_url(&self, repo: &RepositoryRef, rest: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Transport(format!("GitHub API base cannot hold a path: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.repo.as_str()])
            .extend(rest);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, repo: &RepositoryRef, url: Url) -> Result<T, SourceError> {
        tracing::debug!(url = %url, "GitHub request");
        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", repo.credential))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.json()
            .await
            .map_err(|e| SourceError::Payload(format!("{}: {e}", url.path())))
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(url.path().to_string())
    } else {
        SourceError::Transport(format!("{}: {e}", url.path()))
    }
}

/// Decode a contents payload. Anything but base64 decodes to `""`.
fn decode_content(resp: &ContentsResponse) -> String {
    if resp.encoding != "base64" {
        return String::new();
    }
    let compact: String = resp.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

#[async_trait]
impl SourceResolver for GitHubSource {
    async fn resolve(&self, repo: &RepositoryRef) -> Result<RepositoryVersion, SourceError> {
        let info: RepoResponse = self.get_json(repo, self.repo_url(repo, &[])?).await?;

        let mut ref_path = vec!["git", "refs", "heads"];
        ref_path.extend(info.default_branch.split('/'));
        let head: RefResponse = self.get_json(repo, self.repo_url(repo, &ref_path)?).await?;

        let commit: CommitResponse = self
            .get_json(repo, self.repo_url(repo, &["git", "commits", &head.object.sha])?)
            .await?;

        Ok(RepositoryVersion {
            branch: info.default_branch,
            commit_id: head.object.sha,
            tree_id: commit.tree.sha,
        })
    }

    async fn list_files(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        scope: &Scope,
    ) -> Result<Vec<FileDescriptor>, SourceError> {
        let mut url = self.repo_url(repo, &["git", "trees", &version.tree_id])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: TreeResponse = self.get_json(repo, url).await?;

        if tree.truncated {
            tracing::warn!(
                repo = %repo.full_name(),
                tree = %version.tree_id,
                "tree listing truncated by GitHub, using partial listing"
            );
        }
        Ok(filter_tree(tree.tree, scope))
    }

    async fn fetch_content(
        &self,
        repo: &RepositoryRef,
        version: &RepositoryVersion,
        path: &str,
    ) -> Result<String, SourceError> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.repo_url(repo, &segments)?;
        url.query_pairs_mut().append_pair("ref", &version.commit_id);

        let value: serde_json::Value = self.get_json(repo, url).await?;
        if !value.is_object() {
            return Err(SourceError::Payload(format!("{path} is not a file")));
        }
        let contents: ContentsResponse = serde_json::from_value(value)
            .map_err(|e| SourceError::Payload(format!("{path}: {e}")))?;
        Ok(decode_content(&contents))
    }
}
