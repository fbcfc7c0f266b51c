//! Core data model for the document store
//!
//! This module defines the foundational types:
//! - NodeId: Stable node identifier (`sid`)
//! - Attributes: Unordered key → JSON value mapping
//! - Node: A tree node (container, text leaf, or atom)
//! - Mark: An inline formatting range over a node's text
//!
//! The serde representation of [`Node`] is the wire contract consumed by
//! load/export collaborators and collaboration adapters:
//! `{ sid, stype, attributes?, content?, text?, marks?, parentId?, metadata?,
//!    version?, createdAt?, updatedAt? }`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use crate::timestamp::Timestamp;

/// Attribute mapping carried by nodes and marks
///
/// Values are opaque to the core. A `BTreeMap` keeps serialization stable.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Stable node identifier
///
/// Generated identifiers have the shape `"{session}:{counter}"`, but any
/// string supplied by a caller is accepted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a string as a node identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier is the empty string (not yet assigned)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Half-open `[start, end)` offset pair into a node's text
///
/// Offsets count Unicode scalar values (`char`s), not bytes.
/// Serialized as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct MarkRange {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl MarkRange {
    /// Create a range
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of offsets covered (0 for empty or inverted ranges)
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range covers nothing
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the two ranges share at least one offset
    pub fn overlaps(&self, other: &MarkRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the two ranges overlap or are directly adjacent
    pub fn touches(&self, other: &MarkRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl From<(usize, usize)> for MarkRange {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<MarkRange> for (usize, usize) {
    fn from(range: MarkRange) -> Self {
        (range.start, range.end)
    }
}

impl fmt::Display for MarkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Inline formatting applied to a range of a node's text
///
/// A mark without a range covers the node's whole text; normalization
/// materializes it into an explicit range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    /// Mark kind (e.g. "bold", "link")
    pub stype: String,
    /// Opaque mark attributes
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    /// Covered range, `None` meaning the full text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<MarkRange>,
}

impl Mark {
    /// Create a mark over an explicit range
    pub fn new(stype: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            stype: stype.into(),
            attrs: Attributes::new(),
            range: Some(MarkRange::new(start, end)),
        }
    }

    /// Create a mark covering the whole text of its node
    pub fn full(stype: impl Into<String>) -> Self {
        Self {
            stype: stype.into(),
            attrs: Attributes::new(),
            range: None,
        }
    }

    /// Attach attributes
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Attach a single attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Return a copy of this mark over a different range
    pub fn with_range(&self, range: MarkRange) -> Self {
        Self {
            stype: self.stype.clone(),
            attrs: self.attrs.clone(),
            range: Some(range),
        }
    }
}

/// A node of the document tree
///
/// A node is a container (via `content`), a text leaf (via `text`), or an
/// atom (neither). `parent_id` is a back-reference only; ownership is the
/// parent's `content` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier
    pub sid: NodeId,
    /// Schema-level type tag, opaque to the core
    pub stype: String,
    /// Node attributes
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Ordered child identifiers (containers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<NodeId>>,
    /// Text (text-bearing nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Formatting ranges over `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
    /// Back-reference to the owning parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Free-form metadata, not interpreted by the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Write version, bumped once per transaction that touches the node
    #[serde(default)]
    pub version: u64,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Node {
    /// Create an atom node of the given type with an unassigned identifier
    pub fn new(stype: impl Into<String>) -> Self {
        Self {
            sid: NodeId::new(""),
            stype: stype.into(),
            attributes: Attributes::new(),
            content: None,
            text: None,
            marks: Vec::new(),
            parent_id: None,
            metadata: None,
            version: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Create an empty container node
    pub fn container(stype: impl Into<String>) -> Self {
        Self {
            content: Some(Vec::new()),
            ..Self::new(stype)
        }
    }

    /// Create a text leaf
    pub fn text(stype: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(stype)
        }
    }

    /// Assign an explicit identifier
    pub fn with_id(mut self, sid: impl Into<NodeId>) -> Self {
        self.sid = sid.into();
        self
    }

    /// Set a single attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set the child list
    pub fn with_content<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.content = Some(children.into_iter().map(Into::into).collect());
        self
    }

    /// Append a mark
    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Child identifiers, empty for non-containers
    pub fn children(&self) -> &[NodeId] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// Whether this node lists `id` in its content
    pub fn has_child(&self, id: &str) -> bool {
        self.children().iter().any(|c| c.as_str() == id)
    }

    /// Whether this node carries text
    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    /// Text length in `char`s (0 when absent)
    pub fn text_len(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }

    /// Mutable child list, created empty if the node had none
    pub fn content_mut(&mut self) -> &mut Vec<NodeId> {
        self.content.get_or_insert_with(Vec::new)
    }
}
