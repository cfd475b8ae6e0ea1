//! Semantic unit extraction from a syntax tree

use crate::chunking::languages::LanguageSupport;
use crate::chunking::lines::LineIndex;
use crate::models::SemanticUnit;
use tree_sitter::{Node, Tree};

/// Trees nested deeper than this are not searched for units
const MAX_DEPTH: usize = 256;

/// A unit and the units nested inside it
#[derive(Debug, Clone)]
pub(crate) struct UnitNode {
    pub unit: SemanticUnit,
    pub children: Vec<UnitNode>,
}

/// Units of `tree` in source order, each widened upward over its leading comments
pub(crate) fn extract_units(
    tree: &Tree,
    source: &str,
    support: &dyn LanguageSupport,
    index: &LineIndex<'_>,
) -> Vec<UnitNode> {
    let mut units = Vec::new();
    collect(tree.root_node(), source, support, None, 0, &mut units);
    sort_nodes(&mut units);
    absorb_comments(&mut units, 0, index);
    units
}

fn collect(
    node: Node<'_>,
    source: &str,
    support: &dyn LanguageSupport,
    absorbed: Option<usize>,
    depth: usize,
    out: &mut Vec<UnitNode>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let matched = if absorbed == Some(child.id()) {
            None
        } else {
            support.detect_unit(child, source)
        };

        match matched {
            Some(m) => {
                let (start_line, end_line) = node_lines(child);
                let mut unit = SemanticUnit::new(m.kind, m.name, start_line, end_line);
                unit.important = m.important;

                let mut children = Vec::new();
                let inner_absorbed = support.absorbed_child(child).map(|n| n.id());
                collect(child, source, support, inner_absorbed, depth + 1, &mut children);
                out.push(UnitNode { unit, children });
            }
            None => collect(child, source, support, None, depth + 1, out),
        }
    }
}

/// 1-based inclusive lines of a node; a node ending at column 0 ends on the previous line
fn node_lines(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let end_row = if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    };
    (start.row + 1, end_row + 1)
}

fn sort_nodes(nodes: &mut [UnitNode]) {
    nodes.sort_by_key(|n| (n.unit.start_line, n.unit.end_line));
    for node in nodes.iter_mut() {
        sort_nodes(&mut node.children);
    }
}

/// Move each unit's start above the comment lines directly preceding it.
/// Units never grow past `floor` (the previous sibling's end or the parent's first line).
fn absorb_comments(nodes: &mut [UnitNode], floor: usize, index: &LineIndex<'_>) {
    let mut floor = floor;
    for node in nodes.iter_mut() {
        let header = node.unit.start_line;
        let mut start = header;
        let mut line = header.saturating_sub(1);
        while line > floor {
            let text = index.line(line).trim();
            if text.is_empty() {
                line -= 1;
            } else if is_comment_line(text) {
                start = line;
                line -= 1;
            } else {
                break;
            }
        }
        node.unit.start_line = start;
        absorb_comments(&mut node.children, header, index);
        floor = floor.max(node.unit.end_line);
    }
}

fn is_comment_line(text: &str) -> bool {
    ["//", "/*", "*", "#", "--"].iter().any(|p| text.starts_with(p))
}
