//! Mark range algebra
//!
//! Pure functions over a node's text length and mark list. Nothing here
//! knows about the tree; the engine resolves cross-node ranges into local
//! offsets and calls these per node.
//!
//! # Normal form
//!
//! A normalized mark list satisfies:
//! - every mark has an explicit range with `start < end <= text_len`
//! - no two marks of the same `stype` overlap or touch (they are merged)
//! - no exact `(stype, start, end)` duplicates
//! - marks are sorted ascending by `start` (ties by `end`, then `stype`)
//!
//! Text with no characters carries no marks.

use crate::types::{Attributes, Mark, MarkRange};

/// Normalize marks against optional text
pub fn normalize_marks(text: Option<&str>, marks: &[Mark]) -> Vec<Mark> {
    let text_len = text.map_or(0, |t| t.chars().count());
    normalize_for_len(text_len, marks)
}

/// Normalize marks against a text length in `char`s
pub fn normalize_for_len(text_len: usize, marks: &[Mark]) -> Vec<Mark> {
    if text_len == 0 {
        return Vec::new();
    }

    // Clamp, drop empties, drop exact duplicates
    let mut clamped: Vec<(MarkRange, &Mark)> = Vec::with_capacity(marks.len());
    for mark in marks {
        let range = clamp(mark.range, text_len);
        if range.is_empty() {
            continue;
        }
        let duplicate = clamped
            .iter()
            .any(|(r, m)| *r == range && m.stype == mark.stype);
        if !duplicate {
            clamped.push((range, mark));
        }
    }

    // Stable: among equal starts the earlier mark stays first, so its attrs win.
    clamped.sort_by_key(|(range, _)| range.start);

    let mut merged: Vec<Mark> = Vec::with_capacity(clamped.len());
    for (range, mark) in clamped {
        let last_same = merged.iter_mut().rev().find(|m| m.stype == mark.stype);
        if let Some(existing) = last_same {
            if let Some(current) = existing.range {
                if current.touches(&range) {
                    existing.range = Some(MarkRange::new(
                        current.start.min(range.start),
                        current.end.max(range.end),
                    ));
                    continue;
                }
            }
        }
        merged.push(mark.with_range(range));
    }

    merged.sort_by(|a, b| {
        let ra = range_of(a);
        let rb = range_of(b);
        (ra.start, ra.end)
            .cmp(&(rb.start, rb.end))
            .then_with(|| a.stype.cmp(&b.stype))
    });
    merged
}

/// Add `mark` over `range`
///
/// Returns `None` (no change) when the range is empty or falls outside
/// `[0, text_len]`; the mark is never widened to the full text.
pub fn add_mark(text_len: usize, marks: &[Mark], mark: &Mark, range: MarkRange) -> Option<Vec<Mark>> {
    if !in_bounds(text_len, range) {
        return None;
    }
    let mut next = marks.to_vec();
    next.push(mark.with_range(range));
    Some(normalize_for_len(text_len, &next))
}

/// Remove `stype` from `range`, splitting marks that extend past it
///
/// Marks of `stype` that overlap `range` lose the covered part; the parts
/// outside `range` are kept as separate marks with the same attributes.
pub fn remove_mark(text_len: usize, marks: &[Mark], range: MarkRange, stype: &str) -> Vec<Mark> {
    let normalized = normalize_for_len(text_len, marks);
    let mut next = Vec::with_capacity(normalized.len() + 1);
    for mark in normalized {
        let current = range_of(&mark);
        if mark.stype != stype || !current.overlaps(&range) {
            next.push(mark);
            continue;
        }
        if current.start < range.start {
            next.push(mark.with_range(MarkRange::new(current.start, range.start)));
        }
        if current.end > range.end {
            next.push(mark.with_range(MarkRange::new(range.end, current.end)));
        }
    }
    normalize_for_len(text_len, &next)
}

/// Toggle `stype` over `range`
///
/// - no mark of `stype` overlaps `range`: add one covering exactly `range`
/// - otherwise: remove `stype` from `range`, keeping any parts outside it
///
/// Returns `None` (no change) when `range` is empty or out of bounds.
pub fn toggle_mark(
    text_len: usize,
    marks: &[Mark],
    range: MarkRange,
    stype: &str,
    attrs: &Attributes,
) -> Option<Vec<Mark>> {
    if !in_bounds(text_len, range) {
        return None;
    }
    let normalized = normalize_for_len(text_len, marks);
    if has_overlapping(text_len, &normalized, range, stype) {
        Some(remove_mark(text_len, &normalized, range, stype))
    } else {
        let mark = Mark {
            stype: stype.to_string(),
            attrs: attrs.clone(),
            range: Some(range),
        };
        add_mark(text_len, &normalized, &mark, range)
    }
}

/// Whether any mark of `stype` shares an offset with `range`
pub fn has_overlapping(text_len: usize, marks: &[Mark], range: MarkRange, stype: &str) -> bool {
    normalize_for_len(text_len, marks)
        .iter()
        .any(|m| m.stype == stype && range_of(m).overlaps(&range))
}

/// Whether every offset of `range` is covered by a mark of `stype`
pub fn is_mark_active(text_len: usize, marks: &[Mark], range: MarkRange, stype: &str) -> bool {
    if range.is_empty() {
        return false;
    }
    normalize_for_len(text_len, marks).iter().any(|m| {
        let r = range_of(m);
        m.stype == stype && r.start <= range.start && r.end >= range.end
    })
}

/// Marks covering a single offset
pub fn marks_at(marks: &[Mark], offset: usize) -> Vec<&Mark> {
    marks
        .iter()
        .filter(|m| {
            m.range
                .map_or(true, |r| r.start <= offset && offset < r.end)
        })
        .collect()
}

fn in_bounds(text_len: usize, range: MarkRange) -> bool {
    range.start < range.end && range.end <= text_len
}

fn clamp(range: Option<MarkRange>, text_len: usize) -> MarkRange {
    match range {
        Some(r) => MarkRange::new(r.start, r.end.min(text_len)),
        None => MarkRange::new(0, text_len),
    }
}

/// Range of a normalized mark; un-normalized full-text marks read as empty
fn range_of(mark: &Mark) -> MarkRange {
    mark.range.unwrap_or(MarkRange::new(0, 0))
}
