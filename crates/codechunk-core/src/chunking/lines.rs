//! Line bookkeeping and the line-window splitter used when a code file
//! cannot be split by its syntax tree.

use super::{Splitter, TokenBudget};
use crate::error::Result;
use crate::models::{Chunk, Document, SplittingMethod};

/// Byte offsets of line starts, 1-based line numbers
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = Vec::new();
        if !text.is_empty() {
            starts.push(0);
        }
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' && i + 1 < text.len() {
                starts.push(i + 1);
            }
        }
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Line containing `byte`
    pub fn line_of_byte(&self, byte: usize) -> usize {
        self.starts.partition_point(|&s| s <= byte).max(1)
    }

    /// Byte span of lines `start..=end`, including the final newline
    pub fn span(&self, start: usize, end: usize) -> (usize, usize) {
        let count = self.line_count();
        if count == 0 || start > count || start > end {
            return (self.text.len(), self.text.len());
        }
        let from = self.starts[start.max(1) - 1];
        let to = if end < count {
            self.starts[end]
        } else {
            self.text.len()
        };
        (from, to)
    }

    /// Text of lines `start..=end` without the final newline
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let (from, to) = self.span(start, end);
        self.text[from..to].trim_end_matches(['\n', '\r'])
    }

    /// A single line without its newline
    pub fn line(&self, n: usize) -> &'a str {
        self.slice(n, n)
    }
}

/// A window of whole lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// Group lines `first..=last` into windows of `min_chars..=max_chars`
///
/// Windows are filled greedily up to the maximum. A trailing window under the
/// minimum takes lines back from its predecessor until it reaches the minimum.
/// A line longer than `max_chars` is cut at char boundaries into pieces sharing
/// its line number.
pub fn line_windows(
    index: &LineIndex<'_>,
    first: usize,
    last: usize,
    budget: &TokenBudget,
) -> Vec<LineWindow> {
    // (line, text) pieces, overlong lines pre-cut
    let mut pieces: Vec<(usize, String)> = Vec::new();
    for n in first..=last.min(index.line_count()) {
        let line = index.line(n);
        if line.chars().count() <= budget.max_chars {
            pieces.push((n, line.to_string()));
        } else {
            pieces.extend(cut_chars(line, budget.max_chars).into_iter().map(|p| (n, p)));
        }
    }

    let size = |group: &[(usize, String)]| -> usize {
        group.iter().map(|(_, t)| t.chars().count() + 1).sum::<usize>().saturating_sub(1)
    };

    let mut groups: Vec<Vec<(usize, String)>> = Vec::new();
    let mut current: Vec<(usize, String)> = Vec::new();
    for piece in pieces {
        let added = piece.1.chars().count() + usize::from(!current.is_empty());
        if !current.is_empty() && size(&current) + added > budget.max_chars {
            groups.push(std::mem::take(&mut current));
        }
        current.push(piece);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    if groups.len() > 1 {
        let tail_idx = groups.len() - 1;
        let (head, tail) = groups.split_at_mut(tail_idx);
        if let (Some(prev), Some(tail)) = (head.last_mut(), tail.first_mut()) {
            while size(tail) < budget.min_chars && prev.len() > 1 {
                let Some(moved) = prev.pop() else { break };
                tail.insert(0, moved);
                if size(tail) > budget.max_chars {
                    let moved = tail.remove(0);
                    prev.push(moved);
                    break;
                }
            }
        }
    }

    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| LineWindow {
            start_line: g[0].0,
            end_line: g[g.len() - 1].0,
            text: g.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join("\n"),
        })
        .collect()
}

/// Cut `text` into pieces of at most `max` chars
pub(crate) fn cut_chars(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Splits code by whole-line windows, tagging every chunk with why the
/// syntax tree was not used
pub struct LineWindowSplitter {
    budget: TokenBudget,
    reason: &'static str,
}

impl LineWindowSplitter {
    pub fn new(budget: TokenBudget, reason: &'static str) -> Self {
        Self { budget, reason }
    }

    pub fn windows(&self, content: &str) -> Vec<Chunk> {
        let index = LineIndex::new(content);
        if index.line_count() == 0 {
            return Vec::new();
        }
        line_windows(&index, 1, index.line_count(), &self.budget)
            .into_iter()
            .filter(|w| !w.text.trim().is_empty())
            .map(|w| {
                Chunk::new(w.text, w.start_line, w.end_line, SplittingMethod::LineWindow)
                    .with_fallback_reason(self.reason)
            })
            .collect()
    }
}

impl Splitter for LineWindowSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::LineWindow
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        Ok(self.windows(&doc.content))
    }
}
