//! Bug findings produced by the bug-detection generator.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Severity of a bug finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BugSeverity {
    Low,
    #[default]
    Medium,
    High,
}

/// Custom deserializer for BugSeverity that accepts common LLM variations.
///
/// Models asked for "High/Medium/Low" still answer with "critical",
/// "moderate", "minor" and friends. Unknown values land on `Medium`.
impl<'de> Deserialize<'de> for BugSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_default())
    }
}

impl fmt::Display for BugSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugSeverity::High => write!(f, "High"),
            BugSeverity::Medium => write!(f, "Medium"),
            BugSeverity::Low => write!(f, "Low"),
        }
    }
}

impl std::str::FromStr for BugSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "severe" | "error" | "blocker" => Ok(BugSeverity::High),
            "medium" | "moderate" | "warning" | "warn" | "major" => Ok(BugSeverity::Medium),
            "low" | "minor" | "info" | "trivial" | "note" => Ok(BugSeverity::Low),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A reference pulled from a Q&A site for one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    /// Question title.
    pub title: String,
    /// Link to the question.
    pub link: String,
    /// Question score at fetch time.
    pub score: i64,
    /// Body of the highest-voted answer, if one could be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// A single issue reported by the bug detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugFinding {
    /// 1-based line number, or 0 when the model gave none.
    #[serde(default, deserialize_with = "lenient_line")]
    pub line: u32,
    /// Short description of the problem.
    #[serde(default, alias = "description", alias = "title")]
    pub issue: String,
    #[serde(default)]
    pub severity: BugSeverity,
    /// Suggested fix.
    #[serde(default, alias = "suggestion")]
    pub fix: String,
    /// Filled by enrichment before caching.
    #[serde(default)]
    pub references: Vec<ExternalReference>,
}

/// Accept `12`, `"12"`, `"12-14"`, `12.0`, or anything else as 0.
fn lenient_line<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLine {
        Int(i64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let line = match RawLine::deserialize(deserializer)? {
        RawLine::Int(n) => u32::try_from(n.max(0)).unwrap_or(u32::MAX),
        RawLine::Float(f) if f.is_finite() && f >= 0.0 => f as u32,
        RawLine::Float(_) | RawLine::Other(_) => 0,
        RawLine::Text(s) => s
            .trim()
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty())
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0),
    };
    Ok(line)
}
