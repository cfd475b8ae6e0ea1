use super::{line_range_of, Splitter, TokenBudget};
use crate::error::Result;
use crate::models::{Chunk, Document, SplittingMethod};
use text_splitter::TextSplitter;

/// Plain prose (`documentation`) and everything unclassified (`generic`),
/// split on semantic text boundaries with overlap
pub struct ProseSplitter {
    budget: TokenBudget,
    method: SplittingMethod,
}

impl ProseSplitter {
    pub fn documentation(budget: TokenBudget) -> Self {
        Self {
            budget,
            method: SplittingMethod::Documentation,
        }
    }

    pub fn generic(budget: TokenBudget) -> Self {
        Self {
            budget,
            method: SplittingMethod::Generic,
        }
    }
}

impl Splitter for ProseSplitter {
    fn method(&self) -> SplittingMethod {
        self.method
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let splitter = TextSplitter::new(self.budget.text_config(true)?);
        let content = doc.content.as_str();
        Ok(splitter
            .chunk_indices(content)
            .map(|(offset, text)| {
                let (start, end) = line_range_of(content, offset, offset + text.len());
                Chunk::new(text, start, end, self.method)
            })
            .collect())
    }
}
