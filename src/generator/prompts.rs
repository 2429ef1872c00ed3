//! Prompt templates for each LLM-backed operation.

use crate::models::Language;

/// Shared system preamble.
pub const SYSTEM_PROMPT: &str = "You are an expert software engineer. Answer with exactly the \
requested output and nothing else: no preamble, no explanations, no closing remarks.";

pub fn test_cases(code: &str, language: Language) -> String {
    format!(
        "Given the following {language} code, generate comprehensive unit and integration \
         tests using the standard test framework for that language.\n\
         Return ONLY the test code as plain text, without explanations, markdown, or code \
         block fences. The output must be copy-paste ready with correct indentation.\n\n\
         Code:\n{code}\n"
    )
}

pub fn mock_data(code: &str, language: Language) -> String {
    format!(
        "Given the following {language} code (functions, classes, modules), generate:\n\
         - Realistic test input data for each function or class, covering valid input and \
         invalid edge cases\n\
         - Example mocks for any APIs, database calls, or external services it uses, with the \
         language's native mocking tools\n\
         Output ONLY code, one test function per example (named test_*), ready to copy-paste. \
         No explanations.\n\n\
         Code:\n{code}\n"
    )
}

pub fn bug_report(code: &str, language: Language) -> String {
    format!(
        "You are a senior security engineer.\n\
         Review the following {language} code for:\n\
         - Logic bugs\n\
         - Security vulnerabilities (injection, XSS, CSRF, unsafe deserialization, etc.)\n\
         - Bad practices or anti-patterns\n\n\
         For each issue report the line number, a short description, a severity \
         (High/Medium/Low) and a concise suggested fix.\n\n\
         Output ONLY a JSON array:\n\
         [\n  {{\"line\": 12, \"issue\": \"Possible SQL Injection\", \"severity\": \"High\", \
         \"fix\": \"Use parameterized queries\"}}\n]\n\
         Output [] if there are no issues.\n\n\
         Code:\n{code}\n"
    )
}

/// README-style documentation from concatenated sources.
///
/// `sources` is already cut to the character budget; `truncated` tells the
/// model that it is looking at a partial view.
pub fn repo_docs(repo_name: &str, sources: &str, truncated: bool) -> String {
    let partial = if truncated {
        "Only part of the repository fits in this request; document what is shown and do not \
         invent the rest.\n"
    } else {
        ""
    };
    format!(
        "Write README-style documentation in Markdown for the repository {repo_name}.\n\
         Cover: a one-paragraph overview, the main modules and what each is responsible for, \
         the public entry points, and how to run or use it as far as the code shows.\n\
         {partial}\
         Return ONLY the Markdown document.\n\n\
         Sources:\n{sources}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_language_and_code() {
        let code = "def add(a, b): return a + b";
        for prompt in [
            test_cases(code, Language::Python),
            mock_data(code, Language::Python),
            bug_report(code, Language::Python),
        ] {
            assert!(prompt.contains("python"));
            assert!(prompt.ends_with(&format!("{code}\n")));
        }
    }

    #[test]
    fn bug_prompt_shows_json_shape() {
        let prompt = bug_report("x", Language::Go);
        assert!(prompt.contains(r#"{"line": 12, "issue": "Possible SQL Injection""#));
    }

    #[test]
    fn docs_prompt_flags_truncation() {
        assert!(repo_docs("acme/widgets", "src", true).contains("Only part of the repository"));
        assert!(!repo_docs("acme/widgets", "src", false).contains("Only part of the repository"));
    }
}
