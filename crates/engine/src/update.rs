//! Field-level node updates
//!
//! Each field of a [`NodeUpdate`] states its intent explicitly: leave the
//! field alone, replace it, or clear it. An unset field never erases data.

use verso_core::{Attributes, Mark, Node};

/// Intent for one field of an update
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldUpdate<T> {
    /// Leave the field unchanged
    #[default]
    Keep,
    /// Replace the field
    Set(T),
    /// Reset the field to absent (or empty)
    Clear,
}

impl<T> FieldUpdate<T> {
    /// Whether this update leaves the field unchanged
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    fn apply_option(self, slot: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(value) => *slot = Some(value),
            FieldUpdate::Clear => *slot = None,
        }
    }
}

impl<T: Default> FieldUpdate<T> {
    fn apply_value(self, slot: &mut T) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(value) => *slot = value,
            FieldUpdate::Clear => *slot = T::default(),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `Some` sets, `None` clears
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

/// Partial update of a node's non-structural fields
///
/// `content` and `parent_id` are changed only through tree operations.
/// Setting `stype` to a different type is rejected by `update_node`; use
/// `transform_node` instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    /// Type tag; only an unchanged value is accepted
    pub stype: Option<String>,
    /// Replace or clear all attributes
    pub attributes: FieldUpdate<Attributes>,
    /// Replace or clear the text
    pub text: FieldUpdate<String>,
    /// Replace or clear the marks
    pub marks: FieldUpdate<Vec<Mark>>,
    /// Replace or clear metadata
    pub metadata: FieldUpdate<serde_json::Value>,
}

impl NodeUpdate {
    /// An update that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a type tag
    pub fn stype(mut self, stype: impl Into<String>) -> Self {
        self.stype = Some(stype.into());
        self
    }

    /// Replace all attributes
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = FieldUpdate::Set(attributes);
        self
    }

    /// Replace the text
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = FieldUpdate::Set(text.into());
        self
    }

    /// Remove the text
    pub fn clear_text(mut self) -> Self {
        self.text = FieldUpdate::Clear;
        self
    }

    /// Replace the marks
    pub fn marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = FieldUpdate::Set(marks);
        self
    }

    /// Replace metadata
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = FieldUpdate::Set(metadata);
        self
    }

    /// Remove metadata
    pub fn clear_metadata(mut self) -> Self {
        self.metadata = FieldUpdate::Clear;
        self
    }

    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.stype.is_none()
            && self.attributes.is_keep()
            && self.text.is_keep()
            && self.marks.is_keep()
            && self.metadata.is_keep()
    }

    /// Apply to a node in place
    pub fn apply_to(self, node: &mut Node) {
        if let Some(stype) = self.stype {
            node.stype = stype;
        }
        self.attributes.apply_value(&mut node.attributes);
        self.text.apply_option(&mut node.text);
        self.marks.apply_value(&mut node.marks);
        self.metadata.apply_option(&mut node.metadata);
    }
}
