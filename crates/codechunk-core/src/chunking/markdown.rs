use super::{line_range_of, Splitter, TokenBudget};
use crate::error::Result;
use crate::models::{Chunk, Document, SplittingMethod};
use text_splitter::MarkdownSplitter;

/// Markdown split on its own structure (headings, blocks, sentences)
pub struct MarkdownChunkSplitter {
    budget: TokenBudget,
}

/// An ATX heading and the byte offset of its line
#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading {
    offset: usize,
    level: usize,
    title: String,
}

impl MarkdownChunkSplitter {
    pub fn new(budget: TokenBudget) -> Self {
        Self { budget }
    }
}

impl Splitter for MarkdownChunkSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::Markdown
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let content = doc.content.as_str();
        let splitter = MarkdownSplitter::new(self.budget.text_config(true)?);
        let headings = headings(content);

        Ok(splitter
            .chunk_indices(content)
            .map(|(offset, text)| {
                let (start, end) = line_range_of(content, offset, offset + text.len());
                let mut chunk = Chunk::new(text, start, end, SplittingMethod::Markdown);
                if let Some(path) = heading_path(&headings, offset) {
                    chunk = chunk.with_section(path);
                }
                chunk
            })
            .collect())
    }
}

fn headings(content: &str) -> Vec<Heading> {
    let mut found = Vec::new();
    let mut offset = 0;
    let mut fence: Option<&str> = None;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None => {
                if let Some(heading) = parse_heading(trimmed, offset) {
                    found.push(heading);
                }
            }
        }
        offset += line.len();
    }
    found
}

fn parse_heading(line: &str, offset: usize) -> Option<Heading> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim_end();
    Some(Heading {
        offset,
        level,
        title: title.to_string(),
    })
}

/// `# A > ## B` for the headings in scope at `offset`
fn heading_path(headings: &[Heading], offset: usize) -> Option<String> {
    let mut stack: Vec<&Heading> = Vec::new();
    for heading in headings.iter().take_while(|h| h.offset <= offset) {
        while stack.last().is_some_and(|top| top.level >= heading.level) {
            stack.pop();
        }
        stack.push(heading);
    }
    if stack.is_empty() {
        return None;
    }
    Some(
        stack
            .iter()
            .map(|h| format!("{} {}", "#".repeat(h.level), h.title))
            .collect::<Vec<_>>()
            .join(" > "),
    )
}
