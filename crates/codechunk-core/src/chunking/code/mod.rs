//! Syntax-tree driven splitting of source code into whole semantic units.
//!
//! Units (functions, methods, classes, exports, route registrations) are
//! emitted whole when they fit the token budget. An oversize unit with nested
//! units is replaced by its children; an oversize leaf is halved by line range.
//! Consecutive small units are merged, lines outside every emitted unit become
//! residual chunks, and output is in source line order.
//!
//! Token counts are estimated from a fixed characters-per-token ratio, not an
//! exact tokenizer.

mod oversize;
mod units;

use super::languages::{get_language_support, typescript::TypeScriptSupport, LanguageSupport};
use super::lines::{line_windows, LineIndex, LineWindowSplitter};
use super::{visible_chars, Splitter, TokenBudget};
use crate::error::{Result, SplitError};
use crate::models::{Chunk, Document, Language, SemanticUnit, SplittingMethod, UnitKind};
use codechunk_config::{ChunkingConfig, OversizeStrategy};
use tracing::debug;
use units::{extract_units, UnitNode};

pub struct CodeSplitter {
    config: ChunkingConfig,
    budget: TokenBudget,
}

/// A planned chunk before text extraction
#[derive(Debug, Clone)]
struct Piece {
    unit: SemanticUnit,
    /// Explicit text when it differs from the unit's line range
    text: Option<String>,
    reason: Option<&'static str>,
    /// Last source line this piece accounts for, past `unit.end_line` when truncated
    covers_to: Option<usize>,
}

impl Piece {
    fn whole(unit: SemanticUnit) -> Self {
        Self {
            unit,
            text: None,
            reason: None,
            covers_to: None,
        }
    }

    fn last_covered(&self) -> usize {
        self.covers_to.unwrap_or(self.unit.end_line)
    }

    fn text<'a>(&'a self, index: &LineIndex<'a>) -> &'a str {
        match &self.text {
            Some(t) => t,
            None => index.slice(self.unit.start_line, self.unit.end_line),
        }
    }
}

impl CodeSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        let budget = TokenBudget::from_config(&config);
        Self { config, budget }
    }

    /// Split `content` of the file at `path`; never fails
    pub fn split_source(&self, content: &str, path: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let language = Language::from_path(path);
        let result = if !self.config.use_ast {
            Err("ast_disabled")
        } else {
            match support_for(path, language) {
                None => Err(SplitError::UnsupportedLanguage(language.to_string()).reason()),
                Some(support) => self.split_ast(support.as_ref(), content).map_err(|e| {
                    debug!(path, error = %e, "syntax tree unavailable, using line windows");
                    e.reason()
                }),
            }
        };

        match result {
            Ok(chunks) => chunks,
            Err(reason) => LineWindowSplitter::new(self.budget, reason).windows(content),
        }
    }

    fn split_ast(&self, support: &dyn LanguageSupport, content: &str) -> Result<Vec<Chunk>> {
        let mut parser = support.create_parser(content)?;
        let tree = parser.parse(content, None).ok_or_else(|| SplitError::Parse {
            language: support.language().to_string(),
            message: "parser returned no tree".to_string(),
        })?;
        if tree.root_node().has_error() {
            return Err(SplitError::Parse {
                language: support.language().to_string(),
                message: "syntax errors in source".to_string(),
            });
        }

        let index = LineIndex::new(content);
        let nodes = extract_units(&tree, content, support, &index);

        let mut pieces = Vec::new();
        self.plan(&nodes, &index, &mut pieces);
        let mut pieces = self.merge_small(pieces, &index);
        pieces.extend(self.residuals(&pieces, &index));
        pieces.sort_by_key(|p| (p.unit.start_line, p.unit.end_line));

        Ok(pieces
            .iter()
            .map(|p| {
                let chunk = Chunk::new(
                    p.text(&index),
                    p.unit.start_line,
                    p.unit.end_line,
                    SplittingMethod::Ast,
                )
                .with_unit(p.unit.clone());
                match p.reason {
                    Some(r) => chunk.with_fallback_reason(r),
                    None => chunk,
                }
            })
            .collect())
    }

    fn tokens(&self, text: &str) -> usize {
        self.config.estimate_tokens(text)
    }

    fn fits(&self, text: &str) -> bool {
        self.tokens(text) <= self.config.max_tokens
    }

    /// Whole units where they fit, children of oversize parents, parts of oversize leaves
    fn plan(&self, nodes: &[UnitNode], index: &LineIndex<'_>, out: &mut Vec<Piece>) {
        for node in nodes {
            let text = index.slice(node.unit.start_line, node.unit.end_line);
            if self.fits(text) {
                out.push(Piece::whole(node.unit.clone()));
            } else if !node.children.is_empty() {
                self.plan(&node.children, index, out);
            } else {
                out.extend(self.oversize(&node.unit, index));
            }
        }
    }

    fn oversize(&self, unit: &SemanticUnit, index: &LineIndex<'_>) -> Vec<Piece> {
        let fits = |t: &str| self.fits(t);
        match self.config.oversize {
            OversizeStrategy::Split => {
                let ranges = oversize::halve(index, unit.start_line, unit.end_line, fits);
                if ranges.len() < 2 {
                    return vec![Piece::whole(unit.clone())];
                }
                let total = ranges.len();
                ranges
                    .into_iter()
                    .enumerate()
                    .map(|(i, (s, e))| Piece::whole(unit.part_of(i, total, s, e)))
                    .collect()
            }
            OversizeStrategy::Truncate => {
                let mut kept = unit.clone();
                kept.end_line = oversize::truncate(index, unit.start_line, unit.end_line, fits);
                vec![Piece {
                    unit: kept,
                    text: None,
                    reason: Some("truncated"),
                    covers_to: Some(unit.end_line),
                }]
            }
        }
    }

    /// Merge runs of consecutive small units while the merged span fits
    fn merge_small(&self, pieces: Vec<Piece>, index: &LineIndex<'_>) -> Vec<Piece> {
        let mut out = Vec::new();
        let mut group: Vec<Piece> = Vec::new();

        for piece in pieces {
            let small = !piece.unit.is_part() && self.tokens(piece.text(index)) < self.config.min_tokens;
            if !small {
                out.extend(self.close_group(std::mem::take(&mut group), index));
                out.push(piece);
                continue;
            }
            if let Some(first) = group.first() {
                let end = group_end(&group).max(piece.unit.end_line);
                if !self.fits(index.slice(first.unit.start_line, end)) {
                    out.extend(self.close_group(std::mem::take(&mut group), index));
                }
            }
            group.push(piece);
        }
        out.extend(self.close_group(group, index));
        out
    }

    fn close_group(&self, mut group: Vec<Piece>, index: &LineIndex<'_>) -> Option<Piece> {
        let important = group.iter().any(|p| p.unit.important);
        let piece = match group.len() {
            0 => return None,
            1 => group.remove(0),
            _ => {
                let start = group[0].unit.start_line;
                let end = group_end(&group);
                let members: Vec<String> = group.iter().map(|p| p.unit.name.clone()).collect();
                let mut unit = SemanticUnit::new(UnitKind::Merged, members.join(", "), start, end);
                unit.important = important;
                unit.members = members;
                Piece::whole(unit)
            }
        };

        if !important && self.tokens(piece.text(index)) < self.config.min_tokens {
            debug!(unit = %piece.unit.name, "dropping unit below minimum token budget");
            return None;
        }
        Some(piece)
    }

    /// Gaps between emitted pieces that carry enough content on their own
    fn residuals(&self, pieces: &[Piece], index: &LineIndex<'_>) -> Vec<Piece> {
        let total = index.line_count();
        let mut covered = vec![false; total + 1];
        for p in pieces {
            for line in p.unit.start_line..=p.last_covered().min(total) {
                covered[line] = true;
            }
        }

        let mut out = Vec::new();
        let mut line = 1;
        while line <= total {
            if covered[line] {
                line += 1;
                continue;
            }
            let mut end = line;
            while end < total && !covered[end + 1] {
                end += 1;
            }
            out.extend(self.residual_gap(index, line, end));
            line = end + 1;
        }
        out
    }

    fn residual_gap(&self, index: &LineIndex<'_>, mut start: usize, mut end: usize) -> Vec<Piece> {
        while start <= end && index.line(start).trim().is_empty() {
            start += 1;
        }
        while end >= start && index.line(end).trim().is_empty() {
            end -= 1;
        }
        if start > end || visible_chars(index.slice(start, end)) < self.config.min_residual_chars {
            return Vec::new();
        }

        let residual = |s: usize, e: usize, text: Option<String>| Piece {
            unit: SemanticUnit::new(UnitKind::Residual, "residual", s, e),
            text,
            reason: None,
            covers_to: None,
        };

        if self.fits(index.slice(start, end)) {
            return vec![residual(start, end, None)];
        }
        line_windows(index, start, end, &self.budget)
            .into_iter()
            .map(|w| residual(w.start_line, w.end_line, Some(w.text)))
            .collect()
    }
}

fn group_end(group: &[Piece]) -> usize {
    group.iter().map(|p| p.unit.end_line).max().unwrap_or(0)
}

fn support_for(path: &str, language: Language) -> Option<Box<dyn LanguageSupport>> {
    if path.to_ascii_lowercase().ends_with(".tsx") {
        return Some(Box::new(TypeScriptSupport::tsx()));
    }
    get_language_support(language)
}

impl Splitter for CodeSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::Ast
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        Ok(self.split_source(&doc.content, doc.path()))
    }
}
