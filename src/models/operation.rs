//! Operation kinds and request scope.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Every operation whose result can be cached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    ListFiles,
    GenerateTests,
    GenerateMocks,
    DetectBugs,
    FetchFullCode,
    LicenseScan,
    RepoDocs,
    FileContent,
}

/// Storage partition an operation's entries live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Namespace {
    /// Raw file contents.
    Content,
    /// Repository file listings.
    Listing,
    /// Generated or derived artifacts.
    Artifact,
}

impl Operation {
    pub fn namespace(self) -> Namespace {
        match self {
            Operation::FileContent | Operation::FetchFullCode => Namespace::Content,
            Operation::ListFiles => Namespace::Listing,
            Operation::GenerateTests
            | Operation::GenerateMocks
            | Operation::DetectBugs
            | Operation::LicenseScan
            | Operation::RepoDocs => Namespace::Artifact,
        }
    }
}

/// Operations that produce one artifact per source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FileOperation {
    GenerateTests,
    GenerateMocks,
    DetectBugs,
    LicenseScan,
    FetchFullCode,
}

impl FileOperation {
    /// Whether producing this artifact calls the LLM.
    pub fn uses_llm(self) -> bool {
        matches!(
            self,
            FileOperation::GenerateTests | FileOperation::GenerateMocks | FileOperation::DetectBugs
        )
    }
}

impl From<FileOperation> for Operation {
    fn from(op: FileOperation) -> Self {
        match op {
            FileOperation::GenerateTests => Operation::GenerateTests,
            FileOperation::GenerateMocks => Operation::GenerateMocks,
            FileOperation::DetectBugs => Operation::DetectBugs,
            FileOperation::LicenseScan => Operation::LicenseScan,
            FileOperation::FetchFullCode => Operation::FetchFullCode,
        }
    }
}

/// Whether a request covers the whole repository or a single file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum Scope {
    #[default]
    Repository,
    File(String),
}

impl Scope {
    /// `Some(path)` → file scope, `None` → whole repository.
    ///
    /// Leading `./` and `/` are stripped so `./src/a.py` and `src/a.py`
    /// address the same entry.
    pub fn from_path(path: Option<&str>) -> Self {
        match path.map(normalize_path) {
            Some(p) if !p.is_empty() => Scope::File(p),
            _ => Scope::Repository,
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            Scope::Repository => None,
            Scope::File(p) => Some(p),
        }
    }
}

fn normalize_path(path: &str) -> String {
    let mut p = path.trim();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn operation_names_are_snake_case() {
        assert_eq!(Operation::GenerateTests.to_string(), "generate_tests");
        assert_eq!(Operation::FetchFullCode.to_string(), "fetch_full_code");
        assert_eq!("license_scan".parse::<Operation>().unwrap(), Operation::LicenseScan);
        for op in Operation::iter() {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{op}\""));
        }
    }

    #[test]
    fn namespaces() {
        assert_eq!(Operation::FileContent.namespace(), Namespace::Content);
        assert_eq!(Operation::ListFiles.namespace(), Namespace::Listing);
        assert_eq!(Operation::DetectBugs.namespace(), Namespace::Artifact);
        assert_eq!(Namespace::Artifact.to_string(), "artifact");
    }

    #[test]
    fn file_operation_maps_to_operation_of_same_name() {
        for op in [
            FileOperation::GenerateTests,
            FileOperation::GenerateMocks,
            FileOperation::DetectBugs,
            FileOperation::LicenseScan,
            FileOperation::FetchFullCode,
        ] {
            assert_eq!(op.to_string(), Operation::from(op).to_string());
        }
        assert!(FileOperation::DetectBugs.uses_llm());
        assert!(!FileOperation::LicenseScan.uses_llm());
    }

    #[test]
    fn scope_from_path() {
        assert_eq!(Scope::from_path(None), Scope::Repository);
        assert_eq!(Scope::from_path(Some("  ")), Scope::Repository);
        assert_eq!(Scope::from_path(Some("./src/a.py")), Scope::File("src/a.py".into()));
        assert_eq!(Scope::from_path(Some("/src/a.py")), Scope::File("src/a.py".into()));
        assert_eq!(Scope::File("x.go".into()).file(), Some("x.go"));
        assert_eq!(Scope::Repository.file(), None);
    }
}
