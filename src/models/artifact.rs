//! Per-file results and the aggregate response shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::finding::BugFinding;
use super::language::Language;

/// The generated output for one file, keyed in JSON by its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    TestCases(String),
    MockData(String),
    BugReport(Vec<BugFinding>),
    License(Option<String>),
    Content(String),
}

impl Artifact {
    /// Bug findings, if this is a bug report.
    pub fn bug_report(&self) -> Option<&[BugFinding]> {
        match self {
            Artifact::BugReport(findings) => Some(findings),
            _ => None,
        }
    }
}

/// One entry of an [`ArtifactSet`]: `{"language": ..., "<kind>": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub language: Language,
    #[serde(flatten)]
    pub artifact: Artifact,
}

/// Results for a request, keyed by repo-relative path.
///
/// A `BTreeMap` keeps serialization order independent of the order in
/// which concurrent per-file tasks finish.
pub type ArtifactSet = BTreeMap<String, FileReport>;

/// Generated repository documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDocument {
    pub markdown: String,
    /// Files whose source was included in the prompt.
    pub files: Vec<String>,
    /// Whether the source excerpt was cut to fit the prompt budget.
    #[serde(default)]
    pub truncated: bool,
}
