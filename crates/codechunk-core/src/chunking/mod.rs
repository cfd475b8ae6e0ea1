pub mod code;
pub mod emergency;
pub mod json_schema;
pub mod languages;
pub mod lines;
pub mod markdown;
pub mod openapi;
pub mod router;
pub mod structured;
pub mod text;

pub use code::CodeSplitter;
pub use emergency::EmergencySplitter;
pub use json_schema::JsonSchemaSplitter;
pub use lines::{LineIndex, LineWindowSplitter};
pub use markdown::MarkdownChunkSplitter;
pub use openapi::OpenApiSplitter;
pub use router::SplitterRouter;
pub use structured::{JsonConfigSplitter, YamlConfigSplitter};
pub use text::ProseSplitter;

use crate::error::{Result, SplitError};
use crate::models::{Chunk, Document, SplittingMethod};
use codechunk_config::ChunkingConfig;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Turns one document into an ordered list of raw chunks.
///
/// Splitters fill in content, line range and splitter-specific fields; the
/// router stamps document metadata, `chunk_index` and `token_count`.
pub trait Splitter: Send + Sync {
    fn method(&self) -> SplittingMethod;
    fn split(&self, doc: &Document) -> Result<Vec<Chunk>>;
}

/// Character budgets derived from the token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub min_chars: usize,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl TokenBudget {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        let max_chars = config.chars_for_tokens(config.max_tokens);
        Self {
            min_chars: config.chars_for_tokens(config.min_tokens).min(max_chars),
            max_chars,
            overlap_chars: config.chars_for_tokens(config.overlap_tokens),
        }
    }

    /// `text-splitter` configuration aiming between half and all of `max_chars`
    ///
    /// Overlap is clamped below the desired size, which `text-splitter` requires.
    pub fn text_config(&self, with_overlap: bool) -> Result<ChunkConfig<Characters>> {
        let desired = (self.max_chars / 2).max(self.min_chars).max(1);
        let config = ChunkConfig::new(desired..self.max_chars.max(desired) + 1);
        if !with_overlap || self.overlap_chars == 0 {
            return Ok(config);
        }
        let overlap = self.overlap_chars.min(desired.saturating_sub(1));
        config
            .with_overlap(overlap)
            .map_err(|e| SplitError::Internal(e.to_string()))
    }
}

/// Number of non-whitespace characters
pub(crate) fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// 1-based inclusive line range of the byte span `start..end` in `text`
pub(crate) fn line_range_of(text: &str, start: usize, end: usize) -> (usize, usize) {
    let start_line = text[..start].matches('\n').count() + 1;
    let inner = text[start..end].trim_end_matches('\n');
    (start_line, start_line + inner.matches('\n').count())
}

/// One chunk for `text`, or text-split parts sharing `section` when it exceeds the budget.
/// Line numbers are unknown (0) for rendered content.
pub(crate) fn rendered_chunks(
    text: &str,
    section: &str,
    budget: TokenBudget,
    method: SplittingMethod,
) -> Result<Vec<Chunk>> {
    if text.chars().count() <= budget.max_chars {
        return Ok(vec![Chunk::new(text, 0, 0, method).with_section(section)]);
    }
    let splitter = TextSplitter::new(budget.text_config(false)?);
    Ok(splitter
        .chunks(text)
        .map(|part| Chunk::new(part, 0, 0, method).with_section(section))
        .collect())
}
