//! Content type classification
//!
//! A fixed, ordered list of pure predicates; the first match wins and
//! [`ContentKind::Generic`] catches everything else.

use crate::models::{ContentKind, Document, Language};
use once_cell::sync::Lazy;
use regex::Regex;

/// Only the head of a document is inspected for content signatures
const SNIFF_BYTES: usize = 8 * 1024;

static OPENAPI_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*"?(openapi|swagger)"?\s*:"#).expect("valid regex"));
static PATHS_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*"?paths"?\s*:"#).expect("valid regex"));
static INFO_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*"?info"?\s*:"#).expect("valid regex"));
static SCHEMA_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)["']?\$schema["']?\s*:"#).expect("valid regex"));

/// What the predicates look at
struct Signals<'a> {
    file_name: String,
    extension: String,
    head: &'a str,
}

impl<'a> Signals<'a> {
    fn from_document(doc: &'a Document) -> Self {
        Self {
            file_name: doc.file_name(),
            extension: doc.extension(),
            head: head(&doc.content, SNIFF_BYTES),
        }
    }

    fn is_structured(&self) -> bool {
        matches!(self.extension.as_str(), "json" | "yml" | "yaml" | "")
    }
}

type Rule = (ContentKind, fn(&Signals<'_>) -> bool);

const RULES: &[Rule] = &[
    (ContentKind::Code, is_code),
    (ContentKind::Markdown, is_markdown),
    (ContentKind::OpenApi, is_openapi),
    (ContentKind::JsonSchema, is_json_schema),
    (ContentKind::YamlConfig, is_yaml),
    (ContentKind::JsonConfig, is_json),
    (ContentKind::Documentation, is_documentation),
];

/// Assign a content kind to `doc`. Pure and total.
pub fn classify(doc: &Document) -> ContentKind {
    let signals = Signals::from_document(doc);
    RULES
        .iter()
        .find(|(_, matches)| matches(&signals))
        .map(|(kind, _)| *kind)
        .unwrap_or(ContentKind::Generic)
}

fn is_code(s: &Signals<'_>) -> bool {
    Language::from_extension(&s.extension) != Language::Unknown
}

fn is_markdown(s: &Signals<'_>) -> bool {
    matches!(s.extension.as_str(), "md" | "markdown" | "mdx")
}

fn is_openapi(s: &Signals<'_>) -> bool {
    if !s.is_structured() {
        return false;
    }
    if s.file_name.contains("openapi") || s.file_name.contains("swagger") {
        return true;
    }
    OPENAPI_KEY.is_match(s.head) || (PATHS_KEY.is_match(s.head) && INFO_KEY.is_match(s.head))
}

fn is_json_schema(s: &Signals<'_>) -> bool {
    if !s.is_structured() {
        return false;
    }
    SCHEMA_KEY.is_match(s.head) || (!s.extension.is_empty() && s.file_name.contains("schema"))
}

fn is_yaml(s: &Signals<'_>) -> bool {
    matches!(s.extension.as_str(), "yml" | "yaml")
}

fn is_json(s: &Signals<'_>) -> bool {
    s.extension == "json"
}

fn is_documentation(s: &Signals<'_>) -> bool {
    const NAMES: &[&str] = &["readme", "changelog", "changes", "contributing", "license", "authors", "history"];
    matches!(s.extension.as_str(), "txt" | "rst" | "adoc" | "asciidoc" | "org")
        || NAMES.iter().any(|n| s.file_name.starts_with(n))
}

/// Longest prefix of `text` no longer than `max` bytes, on a char boundary
fn head(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(path: &str, content: &str) -> ContentKind {
        classify(&Document::new(path, content))
    }

    #[test]
    fn test_package_json_is_config() {
        assert_eq!(kind("package.json", r#"{"name":"x"}"#), ContentKind::JsonConfig);
    }

    #[test]
    fn test_code_wins_over_content_markers() {
        assert_eq!(kind("src/openapi.ts", "openapi: 3.0.0"), ContentKind::Code);
        assert_eq!(kind("lib.rs", "fn main() {}"), ContentKind::Code);
    }

    #[test]
    fn test_openapi_detection() {
        assert_eq!(kind("api.yaml", "openapi: 3.0.1\ninfo:\n  title: x\n"), ContentKind::OpenApi);
        assert_eq!(kind("spec.json", "{\n  \"swagger\": \"2.0\"\n}"), ContentKind::OpenApi);
        assert_eq!(kind("swagger.yml", "foo: bar"), ContentKind::OpenApi);
        assert_eq!(kind("api.yml", "info:\n  a: 1\npaths:\n  /x: {}\n"), ContentKind::OpenApi);
    }

    #[test]
    fn test_json_schema_detection() {
        let schema = r#"{"$schema": "http://json-schema.org/draft-07/schema#", "type": "object"}"#;
        assert_eq!(kind("user.json", schema), ContentKind::JsonSchema);
        assert_eq!(kind("user.schema.json", "{}"), ContentKind::JsonSchema);
    }

    #[test]
    fn test_yaml_and_docs() {
        assert_eq!(kind(".github/workflows/ci.yml", "on: push"), ContentKind::YamlConfig);
        assert_eq!(kind("README.md", "# Title"), ContentKind::Markdown);
        assert_eq!(kind("CHANGELOG", "v1"), ContentKind::Documentation);
        assert_eq!(kind("notes.txt", "hello"), ContentKind::Documentation);
        assert_eq!(kind("Dockerfile", "FROM rust"), ContentKind::Generic);
    }

    #[test]
    fn test_head_respects_char_boundary() {
        let text = "é".repeat(10);
        assert_eq!(head(&text, 5), "éé");
    }
}
