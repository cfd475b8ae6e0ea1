//! Emergency splitter configuration

use serde::{Deserialize, Serialize};

/// Fixed-size character splitter used when a format splitter fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Window size in characters
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,

    /// Characters shared between consecutive windows
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl crate::validation::Validate for FallbackConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_below, validate_positive};

        validate_positive("fallback.window_chars", self.window_chars as u64)?;
        validate_below(
            "fallback.overlap_chars",
            self.overlap_chars,
            "window_chars",
            self.window_chars,
        )
    }
}

fn default_window_chars() -> usize {
    1000
}

fn default_overlap_chars() -> usize {
    200
}
