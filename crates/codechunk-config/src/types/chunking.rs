//! Chunk budget configuration

use serde::{Deserialize, Serialize};

/// Configuration for chunk sizes and AST splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Minimum estimated tokens for a chunk to be worth embedding
    ///
    /// Semantic units below this are merged with neighbours or dropped
    /// unless they are important (exports, routes, entry points).
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,

    /// Maximum estimated tokens per chunk
    ///
    /// Should match the embedding model's input limit.
    /// Common values:
    /// - 512: Safe for most models
    /// - 1024: For larger context models
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Overlap tokens between consecutive text chunks
    ///
    /// Only used by the prose splitters (markdown, documentation, generic).
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,

    /// Characters per token used for estimation
    ///
    /// Token counts are an approximation (`ceil(chars / chars_per_token)`),
    /// not the output of a real tokenizer.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f32,

    /// Minimum non-whitespace characters for residual content to be kept
    #[serde(default = "default_min_residual_chars")]
    pub min_residual_chars: usize,

    /// Use AST-based splitting for source code
    ///
    /// When false, code is split into line windows.
    #[serde(default = "default_use_ast")]
    pub use_ast: bool,

    /// What to do with a semantic unit larger than `max_tokens`
    #[serde(default)]
    pub oversize: OversizeStrategy,
}

/// Handling of semantic units that exceed the token budget
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OversizeStrategy {
    /// Halve the line range until every part fits
    #[default]
    Split,
    /// Keep only the leading lines that fit
    Truncate,
}

impl ChunkingConfig {
    /// Estimated token count of `text`
    pub fn estimate_tokens(&self, text: &str) -> usize {
        let chars = text.chars().count() as f32;
        (chars / self.chars_per_token.max(0.1)).ceil() as usize
    }

    /// Character budget corresponding to `tokens`
    pub fn chars_for_tokens(&self, tokens: usize) -> usize {
        ((tokens as f32) * self.chars_per_token).floor().max(1.0) as usize
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_tokens(),
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
            chars_per_token: default_chars_per_token(),
            min_residual_chars: default_min_residual_chars(),
            use_ast: default_use_ast(),
            oversize: OversizeStrategy::Split,
        }
    }
}

impl crate::validation::Validate for ChunkingConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_below, validate_positive, validate_range};

        validate_positive("chunking.max_tokens", self.max_tokens as u64)?;
        validate_range("chunking.chars_per_token", self.chars_per_token, 0.5..=16.0)?;
        validate_below("chunking.min_tokens", self.min_tokens, "max_tokens", self.max_tokens)?;
        validate_below(
            "chunking.overlap_tokens",
            self.overlap_tokens,
            "max_tokens",
            self.max_tokens,
        )
    }
}

fn default_min_tokens() -> usize {
    20
}

fn default_max_tokens() -> usize {
    512 // Safe for most embedding models
}

fn default_overlap() -> usize {
    50 // ~10% overlap for context
}

fn default_chars_per_token() -> f32 {
    4.0
}

fn default_min_residual_chars() -> usize {
    100
}

fn default_use_ast() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_default_is_valid() {
        let config = ChunkingConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_too_large() {
        let config = ChunkingConfig {
            max_tokens: 100,
            overlap_tokens: 100, // Equal to max
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_must_be_below_max() {
        let config = ChunkingConfig {
            min_tokens: 600,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        let config = ChunkingConfig::default();
        assert_eq!(config.estimate_tokens(""), 0);
        assert_eq!(config.estimate_tokens("abc"), 1);
        assert_eq!(config.estimate_tokens("abcdefgh"), 2);
        assert_eq!(config.estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn test_strategy_serialization() {
        assert_eq!(
            serde_json::to_string(&OversizeStrategy::Truncate).unwrap(),
            "\"truncate\""
        );
    }
}
