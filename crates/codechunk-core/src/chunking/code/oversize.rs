//! Oversize splitting: halve a line range until every part fits.
//!
//! Split points prefer a blank line or a line that ends a statement within the
//! middle half of the range. Halves are not re-parsed, so a part may still end
//! inside a nested block when no such line exists.

use crate::chunking::lines::LineIndex;

/// Line ranges covering `start..=end` whose text satisfies `fits`, in order
///
/// A single line that does not fit is returned as its own range.
pub(crate) fn halve(
    index: &LineIndex<'_>,
    start: usize,
    end: usize,
    fits: impl Fn(&str) -> bool,
) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut stack = vec![(start, end)];
    while let Some((s, e)) = stack.pop() {
        if s >= e || fits(index.slice(s, e)) {
            parts.push((s, e));
            continue;
        }
        let mid = split_point(index, s, e);
        // second half first so the first half pops next
        stack.push((mid + 1, e));
        stack.push((s, mid));
    }
    parts
}

/// Last line of the first half; always `s <= mid < e`
fn split_point(index: &LineIndex<'_>, s: usize, e: usize) -> usize {
    let len = e - s + 1;
    let mid = s + len / 2 - 1;
    let lo = s + len / 4;
    let hi = (s + (3 * len) / 4).min(e - 1);

    let mut candidates: Vec<usize> = (lo..=hi).collect();
    candidates.sort_by_key(|&k| (k.abs_diff(mid), k));
    candidates
        .into_iter()
        .find(|&k| is_boundary(index, k, e))
        .unwrap_or(mid)
}

fn is_boundary(index: &LineIndex<'_>, k: usize, e: usize) -> bool {
    let line = index.line(k);
    let trimmed = line.trim_end();
    if trimmed.trim().is_empty() || trimmed.ends_with([';', '}', ')']) {
        return true;
    }
    if k < e {
        let next = index.line(k + 1);
        if !next.trim().is_empty() && indent(next) < indent(line) {
            return true;
        }
    }
    false
}

fn indent(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Leading lines of `start..=end` that fit; at least the first line
pub(crate) fn truncate(
    index: &LineIndex<'_>,
    start: usize,
    end: usize,
    fits: impl Fn(&str) -> bool,
) -> usize {
    let mut last = start;
    for k in start..=end {
        if fits(index.slice(start, k)) {
            last = k;
        } else {
            break;
        }
    }
    last
}
