//! Cleaning and parsing of raw LLM responses.

use crate::models::BugFinding;
use crate::providers::ProviderError;

/// Maximum length of LLM response text to include in parse error messages.
const PARSE_ERROR_PREVIEW_LEN: usize = 500;

/// Strip a leading ```` ```lang ```` line and a trailing ```` ``` ````.
pub fn clean_code_block(text: &str) -> String {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = match s.find('\n') {
            Some(nl) => &s[nl + 1..],
            None => "",
        };
    }
    let s = s.trim_end();
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim().to_string()
}

/// Parse a bug-detector response into findings.
///
/// Tried in order: the first balanced `[...]` substring that parses as
/// findings, the whole response, then a `{"findings": [...]}` or
/// `{"bugs": [...]}` wrapper. An empty response is an empty report.
pub fn parse_bug_findings(response: &str) -> Result<Vec<BugFinding>, ProviderError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    for candidate in balanced_arrays(trimmed) {
        if let Ok(findings) = serde_json::from_str::<Vec<BugFinding>>(candidate) {
            return Ok(findings);
        }
    }

    if let Ok(findings) = serde_json::from_str::<Vec<BugFinding>>(trimmed) {
        return Ok(findings);
    }

    if let Some(findings) = unwrap_object(trimmed) {
        return Ok(findings);
    }

    let preview: String = trimmed.chars().take(PARSE_ERROR_PREVIEW_LEN).collect();
    Err(ProviderError::ParseError(format!(
        "could not parse response as bug findings JSON. Response: {preview}"
    )))
}

/// `{"findings": [...]}` / `{"bugs": [...]}`, possibly surrounded by prose.
fn unwrap_object(text: &str) -> Option<Vec<BugFinding>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    ["findings", "bugs"]
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(|arr| serde_json::from_value(arr.clone()).ok())
}

/// Every `[`-to-matching-`]` substring, in order of opening bracket.
///
/// Brackets inside JSON string literals are ignored so an issue text such
/// as `"index [i] out of range"` does not end the match early.
fn balanced_arrays(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('[')
        .filter_map(move |(start, _)| matching_close(&text[start..]).map(|len| &text[start..start + len]))
}

/// Byte length of the balanced array starting at `s[0] == '['`.
fn matching_close(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
