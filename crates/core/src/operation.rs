//! Atomic operations recorded by transactions
//!
//! Every mutation primitive appends one or more [`AtomicOperation`]s to the
//! active transaction's log. The log is what collaboration adapters replicate,
//! so the serde representation is a wire contract:
//!
//! ```text
//! { type: create|update|delete|move, nodeId, data?, timestamp, parentId?, position? }
//! ```
//!
//! Each variant carries only the fields its kind needs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timestamp::Timestamp;
use crate::types::{Node, NodeId};

/// Discriminant of an [`AtomicOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Node creation
    Create,
    /// Node snapshot replacement
    Update,
    /// Re-parenting of an existing node
    Move,
    /// Node removal
    Delete,
}

impl OperationKind {
    /// All kinds in commit replay order: create → update → move → delete
    pub const REPLAY_ORDER: [OperationKind; 4] = [
        OperationKind::Create,
        OperationKind::Update,
        OperationKind::Move,
        OperationKind::Delete,
    ];

    /// Position of this kind in the commit replay order
    pub fn replay_rank(self) -> u8 {
        match self {
            OperationKind::Create => 0,
            OperationKind::Update => 1,
            OperationKind::Move => 2,
            OperationKind::Delete => 3,
        }
    }

    /// Lowercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Move => "move",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded effect in a transaction's ordered log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AtomicOperation {
    /// A node came into existence
    #[serde(rename_all = "camelCase")]
    Create {
        /// Created node
        node_id: NodeId,
        /// Snapshot at creation time
        data: Node,
        /// When the operation was recorded
        timestamp: Timestamp,
        /// Parent the node was created under, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<NodeId>,
        /// Position within the parent's content, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    /// A node's snapshot was replaced
    #[serde(rename_all = "camelCase")]
    Update {
        /// Updated node
        node_id: NodeId,
        /// Snapshot after the update
        data: Node,
        /// When the operation was recorded
        timestamp: Timestamp,
    },
    /// A node was moved under a new parent
    #[serde(rename_all = "camelCase")]
    Move {
        /// Moved node
        node_id: NodeId,
        /// Target parent
        parent_id: NodeId,
        /// Target position (`None` = appended)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        /// When the operation was recorded
        timestamp: Timestamp,
    },
    /// A node was removed
    #[serde(rename_all = "camelCase")]
    Delete {
        /// Deleted node
        node_id: NodeId,
        /// When the operation was recorded
        timestamp: Timestamp,
    },
}

impl AtomicOperation {
    /// Record a creation
    pub fn create(data: Node, parent_id: Option<NodeId>, position: Option<usize>) -> Self {
        AtomicOperation::Create {
            node_id: data.sid.clone(),
            data,
            timestamp: Timestamp::now(),
            parent_id,
            position,
        }
    }

    /// Record a snapshot replacement
    pub fn update(data: Node) -> Self {
        AtomicOperation::Update {
            node_id: data.sid.clone(),
            data,
            timestamp: Timestamp::now(),
        }
    }

    /// Record a move
    pub fn move_to(node_id: NodeId, parent_id: NodeId, position: Option<usize>) -> Self {
        AtomicOperation::Move {
            node_id,
            parent_id,
            position,
            timestamp: Timestamp::now(),
        }
    }

    /// Record a deletion
    pub fn delete(node_id: NodeId) -> Self {
        AtomicOperation::Delete {
            node_id,
            timestamp: Timestamp::now(),
        }
    }

    /// Kind of this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            AtomicOperation::Create { .. } => OperationKind::Create,
            AtomicOperation::Update { .. } => OperationKind::Update,
            AtomicOperation::Move { .. } => OperationKind::Move,
            AtomicOperation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Identifier of the affected node
    pub fn node_id(&self) -> &NodeId {
        match self {
            AtomicOperation::Create { node_id, .. }
            | AtomicOperation::Update { node_id, .. }
            | AtomicOperation::Move { node_id, .. }
            | AtomicOperation::Delete { node_id, .. } => node_id,
        }
    }

    /// When the operation was recorded
    pub fn timestamp(&self) -> Timestamp {
        match self {
            AtomicOperation::Create { timestamp, .. }
            | AtomicOperation::Update { timestamp, .. }
            | AtomicOperation::Move { timestamp, .. }
            | AtomicOperation::Delete { timestamp, .. } => *timestamp,
        }
    }

    /// Node snapshot, for create and update
    pub fn data(&self) -> Option<&Node> {
        match self {
            AtomicOperation::Create { data, .. } | AtomicOperation::Update { data, .. } => {
                Some(data)
            }
            AtomicOperation::Move { .. } | AtomicOperation::Delete { .. } => None,
        }
    }
}

/// Stable sort of an operation log into commit replay order
///
/// Operations of the same kind keep their relative log order.
pub fn replay_order(ops: &[AtomicOperation]) -> Vec<&AtomicOperation> {
    let mut ordered: Vec<&AtomicOperation> = ops.iter().collect();
    ordered.sort_by_key(|op| op.kind().replay_rank());
    ordered
}
