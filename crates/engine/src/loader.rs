//! Load/export helpers and the lazy node view
//!
//! Two shapes are supported:
//! - flat: a map of identifier → [`Node`] (the wire shape)
//! - nested: [`NodeTree`], where children are inlined instead of referenced
//!
//! Loading writes the base layer directly and is rejected while a
//! transaction is open. Exporting reads the resolved view.
//!
//! [`NodeView`] wraps a node and resolves its children only when they are
//! iterated, so walking part of a large document never materializes the
//! rest of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use verso_core::marks::normalize_marks;
use verso_core::{Attributes, Error, Mark, Node, NodeId, Result, Timestamp};

use crate::store::DocumentStore;

/// A node with its children inlined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTree {
    /// Identifier; empty means "generate one"
    #[serde(default, skip_serializing_if = "NodeId::is_empty")]
    pub sid: NodeId,
    /// Type tag
    pub stype: String,
    /// Attributes
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Text, for text nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks over `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
    /// Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Children, for containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeTree>>,
}

impl NodeTree {
    /// A leaf with text
    pub fn text(stype: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            children: None,
            ..Self::container(stype, Vec::new())
        }
    }

    /// A container with children
    pub fn container(stype: impl Into<String>, children: Vec<NodeTree>) -> Self {
        Self {
            sid: NodeId::new(""),
            stype: stype.into(),
            attributes: Attributes::new(),
            text: None,
            marks: Vec::new(),
            metadata: None,
            children: Some(children),
        }
    }

    /// Assign an explicit identifier
    pub fn with_id(mut self, sid: impl Into<NodeId>) -> Self {
        self.sid = sid.into();
        self
    }

    /// Append a mark
    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }
}

impl DocumentStore {
    /// Load a nested tree into the base layer
    ///
    /// Missing identifiers are generated. The top node becomes the root if
    /// no root is set. Returns the top node's identifier.
    ///
    /// # Errors
    /// - `Error::TransactionActive` while a transaction is open
    /// - `Error::DuplicateId` if an identifier already exists; nothing is
    ///   written in that case
    pub fn load_tree(&mut self, tree: NodeTree) -> Result<NodeId> {
        if self.in_transaction() {
            return Err(Error::TransactionActive);
        }
        let mut flat = Vec::new();
        let top = self.flatten(tree, None, &mut flat);

        let mut seen = std::collections::HashSet::new();
        for node in &flat {
            if self.base.contains(&node.sid) || !seen.insert(node.sid.clone()) {
                return Err(Error::DuplicateId(node.sid.clone()));
            }
        }

        let count = flat.len();
        let now = Timestamp::now();
        for mut node in flat {
            node.version = node.version.max(1);
            node.created_at.get_or_insert(now);
            node.updated_at.get_or_insert(now);
            self.base.set(node);
        }
        if self.root_id().is_none() {
            self.set_root(&top)?;
        }
        debug!(nodes = count, root = %top, "loaded tree");
        Ok(top)
    }

    fn flatten(&mut self, tree: NodeTree, parent: Option<NodeId>, out: &mut Vec<Node>) -> NodeId {
        let mut node = Node::new(tree.stype);
        node.sid = tree.sid;
        self.assign_id(&mut node);
        node.attributes = tree.attributes;
        node.marks = normalize_marks(tree.text.as_deref(), &tree.marks);
        node.text = tree.text;
        node.metadata = tree.metadata;
        node.parent_id = parent;
        let id = node.sid.clone();
        let slot = out.len();
        out.push(node);

        if let Some(children) = tree.children {
            let ids: Vec<NodeId> = children
                .into_iter()
                .map(|child| self.flatten(child, Some(id.clone()), out))
                .collect();
            out[slot].content = Some(ids);
        }
        id
    }

    /// Export the subtree under `id` in nested form
    pub fn export_tree(&self, id: &str) -> Option<NodeTree> {
        let node = self.get_node(id)?;
        let children = node.content.as_ref().map(|content| {
            content
                .iter()
                .filter_map(|child| self.export_tree(child))
                .collect()
        });
        Some(NodeTree {
            sid: node.sid.clone(),
            stype: node.stype.clone(),
            attributes: node.attributes.clone(),
            text: node.text.clone(),
            marks: node.marks.clone(),
            metadata: node.metadata.clone(),
            children,
        })
    }

    /// Load flat nodes into the base layer, replacing same-id nodes
    ///
    /// Returns the number of nodes written.
    pub fn load_flat<I>(&mut self, nodes: I) -> Result<usize>
    where
        I: IntoIterator<Item = Node>,
    {
        if self.in_transaction() {
            return Err(Error::TransactionActive);
        }
        let mut count = 0;
        for node in nodes {
            if self.set_node(node, false)?.is_accepted() {
                count += 1;
            }
        }
        debug!(nodes = count, "loaded flat nodes");
        Ok(count)
    }

    /// Export every visible node in flat form
    pub fn export_flat(&self) -> BTreeMap<NodeId, Node> {
        self.all_nodes()
            .into_iter()
            .map(|n| (n.sid.clone(), n.clone()))
            .collect()
    }

    /// Lazy view of a node
    pub fn view(&self, id: &str) -> Option<NodeView<'_>> {
        self.get_node(id).map(|node| NodeView { store: self, node })
    }
}

/// Borrowed node handle whose children resolve on access
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    store: &'a DocumentStore,
    node: &'a Node,
}

impl<'a> NodeView<'a> {
    /// The underlying node
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// Identifier
    pub fn id(&self) -> &'a NodeId {
        &self.node.sid
    }

    /// Type tag
    pub fn stype(&self) -> &'a str {
        &self.node.stype
    }

    /// Text, if any
    pub fn text(&self) -> Option<&'a str> {
        self.node.text.as_deref()
    }

    /// Number of child identifiers (resolved or not)
    pub fn child_count(&self) -> usize {
        self.node.children().len()
    }

    /// Children, resolved one at a time as the iterator advances
    pub fn children(&self) -> impl Iterator<Item = NodeView<'a>> + 'a {
        let store = self.store;
        self.node
            .children()
            .iter()
            .filter_map(move |id| store.view(id))
    }

    /// The `index`-th child
    pub fn child(&self, index: usize) -> Option<NodeView<'a>> {
        let id = self.node.children().get(index)?;
        self.store.view(id)
    }

    /// The parent
    pub fn parent(&self) -> Option<NodeView<'a>> {
        let parent = self.node.parent_id.as_ref()?;
        self.store.view(parent)
    }
}
