use thiserror::Error;

/// Raised by individual splitters. The router recovers from every variant.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("failed to parse {language} source: {message}")]
    Parse { language: String, message: String },

    #[error("no AST grammar for {0}")]
    UnsupportedLanguage(String),

    #[error("invalid {format} document: {message}")]
    Structured {
        format: &'static str,
        message: String,
    },

    #[error("splitter produced no chunks for non-empty content")]
    Empty,

    #[error("splitter failure: {0}")]
    Internal(String),
}

impl SplitError {
    pub fn structured(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Structured {
            format,
            message: err.to_string(),
        }
    }

    /// Short tag recorded as `fallback_reason` on chunks that recover from this error
    pub fn reason(&self) -> &'static str {
        match self {
            SplitError::Parse { .. } => "parse_error",
            SplitError::UnsupportedLanguage(_) => "unsupported_language",
            SplitError::Structured { .. } => "structured_parse_error",
            SplitError::Empty => "empty_result",
            SplitError::Internal(_) => "splitter_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
