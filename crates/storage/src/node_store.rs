//! NodeStore: the committed base layer
//!
//! A flat, authoritative mapping from identifier to node. It performs no
//! validation and knows nothing about transactions; it is mutated by commit
//! replay, by remote operation replay, and by the non-transactional bulk
//! loading path.
//!
//! # Design Notes
//!
//! - **BTreeMap**: iteration order is deterministic, which keeps exports and
//!   query results stable across runs.
//! - **Idempotent structural replay**: `move`, `create` and `delete` only
//!   touch a parent's `content` when it does not already reflect the
//!   operation. A local log carries consolidated parent updates that are
//!   replayed first, so re-applying the edge change must be a no-op.
//! - **Last move wins**: when a log moves the same node more than once, only
//!   its final move is replayed; earlier ones describe intermediate states.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use verso_core::{replay_order, AtomicOperation, Node, NodeId, OperationKind};

/// Committed node map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStore {
    nodes: BTreeMap<NodeId, Node>,
}

/// Result of replaying operations against the base layer
///
/// Counts are per operation kind; `skipped` counts operations whose target
/// could not be resolved (e.g. a move under a parent that does not exist).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyResult {
    /// Number of creates applied
    pub creates: usize,
    /// Number of updates applied
    pub updates: usize,
    /// Number of moves applied
    pub moves: usize,
    /// Number of deletes applied
    pub deletes: usize,
    /// Number of operations that resolved to nothing
    pub skipped: usize,
}

impl ApplyResult {
    /// Total number of operations applied
    pub fn total_operations(&self) -> usize {
        self.creates + self.updates + self.moves + self.deletes
    }

    fn record(&mut self, kind: OperationKind, applied: bool) {
        if !applied {
            self.skipped += 1;
            return;
        }
        match kind {
            OperationKind::Create => self.creates += 1,
            OperationKind::Update => self.updates += 1,
            OperationKind::Move => self.moves += 1,
            OperationKind::Delete => self.deletes += 1,
        }
    }
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a node by identifier
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Insert or replace a node under its own `sid`
    ///
    /// Returns the previous node stored under that identifier.
    pub fn set(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.sid.clone(), node)
    }

    /// Remove a node, returning it if present
    pub fn delete(&mut self, id: &str) -> Option<Node> {
        self.nodes.remove(id)
    }

    /// Whether a node exists
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in identifier order
    pub fn all(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All identifiers in order
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Number of nodes
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Replay a log in commit order: create → update → move → delete
    ///
    /// Within a kind, operations keep their log order, so the last update
    /// of a node wins.
    pub fn apply_all(&mut self, ops: &[AtomicOperation]) -> ApplyResult {
        let mut last_move: HashMap<&NodeId, &AtomicOperation> = HashMap::new();
        for op in ops {
            if let AtomicOperation::Move { node_id, .. } = op {
                last_move.insert(node_id, op);
            }
        }

        let mut result = ApplyResult::default();
        for op in replay_order(ops) {
            if let AtomicOperation::Move { node_id, .. } = op {
                let superseded = last_move
                    .get(node_id)
                    .is_some_and(|last| !std::ptr::eq(*last, op));
                if superseded {
                    result.moves += 1;
                    continue;
                }
            }
            let applied = self.apply(op);
            result.record(op.kind(), applied);
        }
        result
    }

    /// Apply a single operation; returns false if it resolved to nothing
    pub fn apply(&mut self, op: &AtomicOperation) -> bool {
        match op {
            AtomicOperation::Create {
                data,
                parent_id,
                position,
                ..
            } => {
                let mut node = data.clone();
                if parent_id.is_some() {
                    node.parent_id.clone_from(parent_id);
                }
                self.set(node);
                if let Some(parent) = parent_id {
                    self.attach(&data.sid, parent, *position);
                }
                true
            }
            AtomicOperation::Update { data, .. } => {
                self.set(data.clone());
                true
            }
            AtomicOperation::Move {
                node_id,
                parent_id,
                position,
                ..
            } => self.apply_move(node_id, parent_id, *position),
            AtomicOperation::Delete { node_id, .. } => match self.nodes.remove(node_id.as_str()) {
                Some(node) => {
                    if let Some(parent) = node.parent_id {
                        self.detach(node_id, &parent);
                    }
                    true
                }
                None => {
                    debug!(node_id = %node_id, "delete of absent node skipped");
                    false
                }
            },
        }
    }

    fn apply_move(&mut self, node_id: &NodeId, parent_id: &NodeId, position: Option<usize>) -> bool {
        if !self.nodes.contains_key(parent_id.as_str()) {
            debug!(node_id = %node_id, parent_id = %parent_id, "move under absent parent skipped");
            return false;
        }
        let settled = self
            .nodes
            .get(node_id.as_str())
            .is_some_and(|n| n.parent_id.as_ref() == Some(parent_id))
            && self
                .nodes
                .get(parent_id.as_str())
                .is_some_and(|p| p.has_child(node_id));
        if settled {
            if let Some(position) = position {
                self.reposition(node_id, parent_id, position);
            }
            return true;
        }
        let previous = match self.nodes.get_mut(node_id.as_str()) {
            Some(node) => node.parent_id.replace(parent_id.clone()),
            None => {
                debug!(node_id = %node_id, "move of absent node skipped");
                return false;
            }
        };
        if let Some(old_parent) = previous.filter(|p| p != parent_id) {
            self.detach(node_id, &old_parent);
        }
        self.attach(node_id, parent_id, position);
        true
    }

    /// Insert `child` into `parent`'s content unless it is already listed
    fn attach(&mut self, child: &NodeId, parent: &NodeId, position: Option<usize>) {
        if let Some(parent_node) = self.nodes.get_mut(parent.as_str()) {
            if parent_node.has_child(child) {
                return;
            }
            let content = parent_node.content_mut();
            let at = position.unwrap_or(content.len()).min(content.len());
            content.insert(at, child.clone());
        }
    }

    /// Shift an already listed `child` to `position` within `parent`
    fn reposition(&mut self, child: &NodeId, parent: &NodeId, position: usize) {
        let Some(content) = self
            .nodes
            .get_mut(parent.as_str())
            .and_then(|p| p.content.as_mut())
        else {
            return;
        };
        let Some(current) = content.iter().position(|c| c == child) else {
            return;
        };
        let at = position.min(content.len() - 1);
        if current != at {
            let id = content.remove(current);
            content.insert(at, id);
        }
    }

    /// Remove `child` from `parent`'s content if listed
    fn detach(&mut self, child: &NodeId, parent: &NodeId) {
        if let Some(content) = self
            .nodes
            .get_mut(parent.as_str())
            .and_then(|p| p.content.as_mut())
        {
            content.retain(|c| c != child);
        }
    }
}

impl FromIterator<Node> for NodeStore {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().map(|n| (n.sid.clone(), n)).collect(),
        }
    }
}
