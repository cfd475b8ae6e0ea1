//! Errors raised while loading and validating configuration

pub mod format;

use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

pub use format::ErrorFormatter;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot tell the format of {path} (expected .yml, .yaml, .toml or .json)")]
    UnknownFormat { path: PathBuf },

    /// Syntax or type error inside a config file; `context` is a source excerpt
    #[error("invalid {format} configuration{location}: {message}\n{context}")]
    ParseError {
        format: &'static str,
        location: String,
        message: String,
        context: String,
    },

    #[error("could not read {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{field}: '{value}' is not one of {options} ({hint})")]
    InvalidEnum {
        field: String,
        value: String,
        options: String,
        hint: String,
    },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    #[error("environment variable {var}: {message}")]
    EnvVarError { var: String, message: String },

    #[error("Validation error: {field}: {message}")]
    ValidationError { field: String, message: String },
}

/// 1-based position inside a config file. A zero column means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of the byte `offset` in `content`
    pub fn at_offset(content: &str, offset: usize) -> Self {
        let before = content.get(..offset).unwrap_or(content);
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before.len() - line_start + 1,
        }
    }
}

impl ConfigError {
    /// An unknown enum value, with a hint naming the closest option
    pub fn invalid_enum(
        field: impl Into<String>,
        value: impl Into<String>,
        options: &[&str],
    ) -> Self {
        let value = value.into();
        let hint = match closest(&value, options) {
            Some(option) => format!("did you mean '{option}'?"),
            None => "no similar option".to_string(),
        };
        Self::InvalidEnum {
            field: field.into(),
            value,
            options: options.join(", "),
            hint,
        }
    }

    /// A parse failure in `content`; `origin` names the file when there is one
    pub fn parse(
        format: &'static str,
        message: impl Into<String>,
        content: &str,
        position: Option<Position>,
        origin: Option<&str>,
    ) -> Self {
        let mut location = String::new();
        if let Some(origin) = origin {
            let _ = write!(location, " in {origin}");
        }
        if let Some(pos) = position.filter(|p| p.line > 0) {
            let _ = write!(location, " at line {}", pos.line);
        }
        Self::ParseError {
            format,
            location,
            message: message.into(),
            context: position.map(|p| excerpt(content, p)).unwrap_or_default(),
        }
    }
}

fn closest<'a>(input: &str, options: &[&'a str]) -> Option<&'a str> {
    let input = input.to_ascii_lowercase();
    options
        .iter()
        .map(|option| (levenshtein(&input, &option.to_ascii_lowercase()), *option))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, option)| option)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// The offending line with one line of context each side, and a caret
/// under the column when it is known
fn excerpt(content: &str, pos: Position) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if pos.line == 0 || pos.line > lines.len() {
        return String::new();
    }
    let mut out = String::new();
    let first = pos.line.saturating_sub(1).max(1);
    let last = (pos.line + 1).min(lines.len());
    for number in first..=last {
        let marker = if number == pos.line { '→' } else { ' ' };
        let _ = writeln!(out, "{marker} {number:>4} | {}", lines[number - 1]);
        if number == pos.line && pos.column > 0 {
            let _ = writeln!(out, "       | {}^", " ".repeat(pos.column - 1));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_names_closest_option() {
        let err = ConfigError::invalid_enum("dedup.hash_algorithm", "sha265", &["auto", "xxh3", "sha256"]);
        match err {
            ConfigError::InvalidEnum { hint, options, .. } => {
                assert_eq!(hint, "did you mean 'sha256'?");
                assert_eq!(options, "auto, xxh3, sha256");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_hint_for_distant_value() {
        assert_eq!(closest("completely-different", &["split", "truncate"]), None);
        assert_eq!(closest("TRUNCATE", &["split", "truncate"]), Some("truncate"));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_excerpt_marks_line_and_column() {
        let content = "a: 1\nb: [\nc: 3\n";
        let text = excerpt(content, Position::new(2, 4));
        assert!(text.contains("→    2 | b: ["));
        assert!(text.contains("     1 | a: 1"));
        assert!(text.contains("     3 | c: 3"));
        assert!(text.contains("\n       |    ^\n"));
    }

    #[test]
    fn test_position_at_offset() {
        let content = "[pool]\nmax_workers = x\n";
        assert_eq!(Position::at_offset(content, 0), Position::new(1, 1));
        assert_eq!(Position::at_offset(content, 21), Position::new(2, 15));
    }

    #[test]
    fn test_parse_error_location() {
        let content = "{\n  \"pool\": {\n    \"max_workers\": ,\n  }\n}";
        let source = serde_json::from_str::<serde_json::Value>(content).unwrap_err();
        let err = ConfigError::parse(
            "JSON",
            source.to_string(),
            content,
            Some(Position::new(source.line(), source.column())),
            Some("cfg.json"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("invalid JSON configuration in cfg.json at line 3"));
        assert!(msg.contains("→    3 |"));
    }
}
