//! Supported source languages and file descriptors.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A language the generators accept, derived from file extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    Typescript,
    Cpp,
    C,
    Csharp,
    Ruby,
    Go,
    Php,
}

impl Language {
    /// Look up a language by file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Language::Python),
            "js" => Some(Language::Javascript),
            "java" => Some(Language::Java),
            "ts" => Some(Language::Typescript),
            "cpp" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "cs" => Some(Language::Csharp),
            "rb" => Some(Language::Ruby),
            "go" => Some(Language::Go),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    /// Look up a language for a repo-relative path.
    ///
    /// Only the final extension counts, and dotfiles such as `.py` alone
    /// have no extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::from_extension(ext)
    }
}

/// A supported source file within a repository snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path relative to the repository root.
    pub path: String,
    pub language: Language,
}

impl FileDescriptor {
    /// Build a descriptor if the path has a supported extension.
    pub fn for_path(path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        let language = Language::from_path(&path)?;
        Some(Self { path, language })
    }
}
