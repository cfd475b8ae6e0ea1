use super::{line_range_of, Splitter};
use crate::error::Result;
use crate::models::{Chunk, Document, SplittingMethod};
use codechunk_config::FallbackConfig;

/// Fixed-size character windows with fixed overlap. Cannot fail; used by
/// the router when a format splitter does.
pub struct EmergencySplitter {
    window: usize,
    overlap: usize,
}

impl EmergencySplitter {
    pub fn new(config: &FallbackConfig) -> Self {
        let window = config.window_chars.max(1);
        Self {
            window,
            overlap: config.overlap_chars.min(window - 1),
        }
    }

    pub fn windows(&self, content: &str) -> Vec<Chunk> {
        // byte offset of every char, plus the end
        let bounds: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        let char_count = bounds.len() - 1;
        let step = self.window - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.window).min(char_count);
            let (from, to) = (bounds[start], bounds[end]);
            let (first, last) = line_range_of(content, from, to);
            chunks.push(Chunk::new(
                &content[from..to],
                first,
                last,
                SplittingMethod::EmergencyFixedSize,
            ));
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Splitter for EmergencySplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::EmergencyFixedSize
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        Ok(self.windows(&doc.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(window_chars: usize, overlap_chars: usize) -> EmergencySplitter {
        EmergencySplitter::new(&FallbackConfig {
            window_chars,
            overlap_chars,
        })
    }

    #[test]
    fn test_fixed_windows_with_overlap() {
        let content: String = ('a'..='z').collect();
        let chunks = splitter(10, 3).windows(&content);
        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "hijklmnopq");
        assert!(chunks.last().unwrap().content.ends_with('z'));
    }

    #[test]
    fn test_multibyte_content() {
        let content = "héllo wörld ".repeat(20);
        let chunks = splitter(7, 2).windows(&content);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 7));
    }

    #[test]
    fn test_empty_content() {
        assert!(splitter(10, 2).windows("").is_empty());
    }
}
