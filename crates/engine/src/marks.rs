//! Mark operations on stored nodes
//!
//! Resolves a [`TextRange`] (which may span several text nodes) into
//! per-node local ranges, then runs the pure mark algebra from
//! `verso_core::marks` on each node. A node whose marks change is written
//! through the overlay and touched, so it gets one consolidated update.
//!
//! For a range from node `A` offset `s` to node `C` offset `e`, with `B`
//! between them in document order:
//!
//! ```text
//! A: [s, len(A))   B: [0, len(B))   C: [0, e)
//! ```
//!
//! Offsets outside a node's text make that node a no-op; a mark is never
//! widened to the full text as a fallback.

use verso_core::marks as algebra;
use verso_core::{Attributes, Error, Mark, MarkRange, NodeId, Result};

use crate::store::DocumentStore;

/// A point in the document: a text node and a `char` offset into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPosition {
    /// Text node
    pub node_id: NodeId,
    /// Offset in `char`s
    pub offset: usize,
}

impl TextPosition {
    /// Create a position
    pub fn new(node_id: impl Into<NodeId>, offset: usize) -> Self {
        Self {
            node_id: node_id.into(),
            offset,
        }
    }
}

/// A half-open selection between two text positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    /// Inclusive start
    pub start: TextPosition,
    /// Exclusive end
    pub end: TextPosition,
}

impl TextRange {
    /// Create a range between two positions
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        Self { start, end }
    }

    /// A range inside a single node
    pub fn within(node_id: impl Into<NodeId>, start: usize, end: usize) -> Self {
        let node_id = node_id.into();
        Self {
            start: TextPosition::new(node_id.clone(), start),
            end: TextPosition::new(node_id, end),
        }
    }

    /// Whether both ends are in the same node
    pub fn is_single_node(&self) -> bool {
        self.start.node_id == self.end.node_id
    }
}

impl DocumentStore {
    /// Split a text range into per-node local ranges, in document order
    ///
    /// Returns an empty list when the end does not follow the start.
    ///
    /// # Errors
    /// `Error::NodeNotFound` if either end names an unknown node.
    pub fn resolve_text_range(&self, range: &TextRange) -> Result<Vec<(NodeId, MarkRange)>> {
        let start = self.resolve(&range.start.node_id);
        let end = self.resolve(&range.end.node_id);
        let start_node = self.require(&start)?;
        self.require(&end)?;

        if start == end {
            return Ok(vec![(
                start,
                MarkRange::new(range.start.offset, range.end.offset),
            )]);
        }

        let top = self
            .ancestors(&start)
            .last()
            .map_or_else(|| start_node.sid.clone(), |n| n.sid.clone());
        let ordered = self.text_nodes_in_order(&top);
        let Some(first) = ordered.iter().position(|n| n.sid == start) else {
            return Ok(Vec::new());
        };
        let Some(last) = ordered.iter().position(|n| n.sid == end).filter(|&l| l > first) else {
            return Ok(Vec::new());
        };

        Ok(ordered[first..=last]
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let len = node.text_len();
                let local = if i == 0 {
                    MarkRange::new(range.start.offset, len)
                } else if i == last - first {
                    MarkRange::new(0, range.end.offset)
                } else {
                    MarkRange::new(0, len)
                };
                (node.sid.clone(), local)
            })
            .collect())
    }

    /// Normalize a node's marks in place
    ///
    /// Returns whether anything changed.
    pub fn normalize_marks(&mut self, node_id: &str) -> Result<bool> {
        self.overlay.ensure_active()?;
        let node = self.require(node_id)?;
        let normalized = algebra::normalize_marks(node.text.as_deref(), &node.marks);
        let id = node.sid.clone();
        self.replace_marks(&id, normalized)
    }

    /// Add a mark to one node; a mark without a range covers the whole text
    ///
    /// Returns false (no change) when the range is out of bounds.
    pub fn add_mark(&mut self, node_id: &str, mark: Mark) -> Result<bool> {
        self.overlay.ensure_active()?;
        let node = self.require(node_id)?;
        let len = node.text_len();
        let range = mark.range.unwrap_or(MarkRange::new(0, len));
        let id = node.sid.clone();
        match algebra::add_mark(len, &node.marks, &mark, range) {
            Some(next) => self.replace_marks(&id, next),
            None => Ok(false),
        }
    }

    /// Remove `stype` from a range of one node, splitting partial overlaps
    pub fn remove_mark(&mut self, node_id: &str, range: MarkRange, stype: &str) -> Result<bool> {
        self.overlay.ensure_active()?;
        let node = self.require(node_id)?;
        let next = algebra::remove_mark(node.text_len(), &node.marks, range, stype);
        let id = node.sid.clone();
        self.replace_marks(&id, next)
    }

    /// Add `mark` over every node spanned by `range`
    ///
    /// Returns the number of nodes that changed.
    pub fn apply_mark(&mut self, range: &TextRange, mark: &Mark) -> Result<usize> {
        self.overlay.ensure_active()?;
        let mut changed = 0;
        for (id, local) in self.resolve_text_range(range)? {
            let node = self.require(&id)?;
            if let Some(next) = algebra::add_mark(node.text_len(), &node.marks, mark, local) {
                if self.replace_marks(&id, next)? {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    /// Toggle `stype` over `range`
    ///
    /// If any spanned node has a mark of `stype` overlapping its part of the
    /// range, the type is removed from the whole range (splitting marks that
    /// extend past it). Otherwise a mark covering exactly the range is added.
    pub fn toggle_mark(
        &mut self,
        range: &TextRange,
        stype: &str,
        attrs: Option<Attributes>,
    ) -> Result<usize> {
        self.overlay.ensure_active()?;
        let spans = self.resolve_text_range(range)?;
        let active = spans.iter().any(|(id, local)| {
            self.get_node(id).is_some_and(|n| {
                algebra::has_overlapping(n.text_len(), &n.marks, *local, stype)
            })
        });

        let mark = Mark::full(stype).with_attrs(attrs.unwrap_or_default());
        let mut changed = 0;
        for (id, local) in spans {
            let node = self.require(&id)?;
            let len = node.text_len();
            let next = if active {
                Some(algebra::remove_mark(len, &node.marks, local, stype))
            } else {
                algebra::add_mark(len, &node.marks, &mark, local)
            };
            if let Some(next) = next {
                if self.replace_marks(&id, next)? {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    /// Whether `stype` covers every offset of `range`
    pub fn is_mark_active(&self, range: &TextRange, stype: &str) -> Result<bool> {
        let spans = self.resolve_text_range(range)?;
        if spans.is_empty() {
            return Ok(false);
        }
        for (id, local) in spans {
            let node = self.require(&id)?;
            if !algebra::is_mark_active(node.text_len(), &node.marks, local, stype) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Marks covering `offset` in a node
    pub fn marks_at(&self, node_id: &str, offset: usize) -> Result<Vec<&Mark>> {
        let node = self.require(node_id)?;
        Ok(algebra::marks_at(&node.marks, offset))
    }

    fn replace_marks(&mut self, id: &NodeId, marks: Vec<Mark>) -> Result<bool> {
        let current = self
            .get_node(id)
            .ok_or_else(|| Error::NodeNotFound(id.clone()))?;
        if current.marks == marks {
            return Ok(false);
        }
        self.write(id)?.marks = marks;
        self.touch(id);
        Ok(true)
    }
}
