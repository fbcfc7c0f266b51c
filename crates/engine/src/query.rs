//! Query engine over the resolved (overlay + base) view
//!
//! All queries are synchronous reads and reflect uncommitted changes of the
//! active transaction. Results that are not tree-ordered come back sorted by
//! identifier.

use std::collections::HashSet;

use serde_json::Value;

use verso_core::{Node, NodeId};

use crate::store::DocumentStore;

impl DocumentStore {
    /// Every visible node, sorted by identifier
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .overlay
            .overlay_nodes()
            .chain(self.base.all().filter(|n| {
                !self.overlay.is_deleted(&n.sid) && !self.overlay.holds(&n.sid)
            }))
            .collect();
        nodes.sort_by(|a, b| a.sid.cmp(&b.sid));
        nodes
    }

    /// Number of visible nodes
    pub fn node_count(&self) -> usize {
        self.all_nodes().len()
    }

    /// Nodes matching `predicate`
    pub fn find_nodes<F>(&self, predicate: F) -> Vec<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        self.all_nodes().into_iter().filter(|n| predicate(n)).collect()
    }

    /// Nodes of a given type
    pub fn find_by_type(&self, stype: &str) -> Vec<&Node> {
        self.find_nodes(|n| n.stype == stype)
    }

    /// Nodes whose attribute `key` equals `value`
    pub fn find_by_attribute(&self, key: &str, value: &Value) -> Vec<&Node> {
        self.find_nodes(|n| n.attributes.get(key) == Some(value))
    }

    /// Resolved children in content order; dangling identifiers are skipped
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.get_node(id)
            .map(|node| {
                node.children()
                    .iter()
                    .filter_map(|c| self.get_node(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The parent node
    pub fn parent(&self, id: &str) -> Option<&Node> {
        let parent = self.get_node(id)?.parent_id.as_ref()?;
        self.get_node(parent)
    }

    /// Ancestors, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            if !seen.insert(&node.sid) {
                break;
            }
            out.push(node);
            current = self.parent(&node.sid);
        }
        out
    }

    /// Descendants in pre-order (document order), excluding `id` itself
    pub fn descendants(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        let Some(start) = self.get_node(id) else {
            return out;
        };
        seen.insert(&start.sid);
        let mut stack: Vec<&Node> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(&node.sid) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(&node.sid).into_iter().rev());
        }
        out
    }

    /// Whether `ancestor` is a proper ancestor of `id`
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).iter().any(|n| n.sid == ancestor)
    }

    /// Text-bearing nodes under (and including) `id`, in document order
    pub fn text_nodes_in_order(&self, id: &str) -> Vec<&Node> {
        self.get_node(id)
            .into_iter()
            .chain(self.descendants(id))
            .filter(|n| n.is_text())
            .collect()
    }
}
