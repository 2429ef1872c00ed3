//! License header detection.
//!
//! Looks for an `SPDX-License-Identifier:` tag in the first lines of a
//! file, then falls back to well-known license banner phrases.

use std::sync::LazyLock;

use regex::Regex;

/// How many leading lines are searched.
const HEADER_LINES: usize = 30;

static SPDX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SPDX-License-Identifier:\s*([A-Za-z0-9.+\-]+(?:\s+(?:OR|AND|WITH)\s+[A-Za-z0-9.+\-]+)*)")
        .unwrap()
});

/// Banner phrase → SPDX identifier, most specific first.
static BANNERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)GNU\s+LESSER\s+GENERAL\s+PUBLIC\s+LICENSE", "LGPL"),
        (r"(?i)GNU\s+(?:GENERAL\s+PUBLIC\s+LICENSE|GPL).{0,200}?version\s+3", "GPL-3.0"),
        (r"(?i)GNU\s+(?:GENERAL\s+PUBLIC\s+LICENSE|GPL).{0,200}?version\s+2", "GPL-2.0"),
        (r"(?i)Apache\s+License,?\s+Version\s+2\.0", "Apache-2.0"),
        (r"(?i)Mozilla\s+Public\s+License,?\s+v(?:ersion)?\.?\s*2\.0", "MPL-2.0"),
        (r"(?i)Permission\s+is\s+hereby\s+granted,\s+free\s+of\s+charge", "MIT"),
        (r"(?i)\bMIT\s+License\b", "MIT"),
        (r"(?i)Redistribution\s+and\s+use\s+in\s+source\s+and\s+binary\s+forms", "BSD"),
    ]
    .into_iter()
    .map(|(pattern, id)| (Regex::new(&format!("(?s){pattern}")).unwrap(), id))
    .collect()
});

/// Detect the license declared in a file's header, if any.
pub fn detect_license(code: &str) -> Option<String> {
    let header: String = code.lines().take(HEADER_LINES).collect::<Vec<_>>().join("\n");

    if let Some(caps) = SPDX_RE.captures(&header) {
        return Some(caps[1].trim().to_string());
    }

    BANNERS
        .iter()
        .find(|(re, _)| re.is_match(&header))
        .map(|(_, id)| id.to_string())
}
