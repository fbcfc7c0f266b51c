//! Copy-on-write transactional overlay
//!
//! The overlay sits above the committed [`NodeStore`] and buffers every
//! in-progress mutation of a transaction:
//!
//! - `nodes`: nodes created or modified in this transaction
//! - `deleted`: identifiers removed in this transaction
//! - `touched`: nodes whose structural links changed; each gets one
//!   consolidated `update` operation when the log is flushed
//! - `ops`: the ordered operation log
//! - `aliases`: transaction-local symbolic names
//!
//! # Read resolution
//!
//! 1. identifier in `deleted` → not found
//! 2. identifier in `nodes` → overlay copy
//! 3. otherwise → base copy (or not found)
//!
//! # Write path
//!
//! A node is cloned from the base into the overlay the first time it is
//! written in a transaction and mutated in place afterwards. Beginning a
//! transaction never clones the base map.
//!
//! # Lifecycle
//!
//! ```text
//! begin()  Idle → Active
//! end()    flushes touched nodes, returns the log, stays Active
//! commit() flushes, replays create → update → move → delete, → Idle
//! rollback() discards everything, → Idle
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::debug;

use verso_core::{AtomicOperation, Error, Node, NodeId, OperationKind, Result, Timestamp};
use verso_storage::{ApplyResult, NodeStore};

use crate::alias::AliasTable;

/// Status of the overlay's transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction; mutations are rejected
    Idle,
    /// A transaction is open and accepting mutations
    Active,
}

/// Summary of buffered operations that a rollback would discard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Buffered creates
    pub creates: usize,
    /// Buffered updates
    pub updates: usize,
    /// Buffered moves
    pub moves: usize,
    /// Buffered deletes
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of buffered operations
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.moves + self.deletes
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone)]
pub struct CommitSummary {
    /// The committed log, in call order
    pub operations: Vec<AtomicOperation>,
    /// What replay did to the base layer
    pub applied: ApplyResult,
    /// How long the transaction was open
    pub elapsed: Duration,
}

/// Transactional copy-on-write layer
#[derive(Debug, Clone)]
pub struct Overlay {
    status: TransactionStatus,
    nodes: HashMap<NodeId, Node>,
    deleted: HashSet<NodeId>,
    touched: Vec<NodeId>,
    ops: Vec<AtomicOperation>,
    aliases: AliasTable,
    started_at: Option<Instant>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay {
    /// Create an idle overlay
    pub fn new() -> Self {
        Self {
            status: TransactionStatus::Idle,
            nodes: HashMap::new(),
            deleted: HashSet::new(),
            touched: Vec::new(),
            ops: Vec::new(),
            aliases: AliasTable::new(),
            started_at: None,
        }
    }

    // === Lifecycle ===

    /// Open a transaction
    ///
    /// # Errors
    /// `Error::TransactionActive` if one is already open; transactions do not nest.
    pub fn begin(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(Error::TransactionActive);
        }
        self.clear();
        self.status = TransactionStatus::Active;
        self.started_at = Some(Instant::now());
        debug!("transaction begin");
        Ok(())
    }

    /// Flush touched nodes and return the log without clearing anything
    ///
    /// Callers can inspect the log before deciding to commit or roll back.
    pub fn end(&mut self) -> Result<Vec<AtomicOperation>> {
        self.ensure_active()?;
        self.flush_touched();
        Ok(self.ops.clone())
    }

    /// Replay the log against `base` and clear the overlay
    pub fn commit(&mut self, base: &mut NodeStore) -> Result<CommitSummary> {
        self.ensure_active()?;
        self.flush_touched();

        let operations = std::mem::take(&mut self.ops);
        let applied = base.apply_all(&operations);
        let elapsed = self.elapsed().unwrap_or_default();
        self.clear();

        debug!(
            txn_ops = operations.len(),
            creates = applied.creates,
            updates = applied.updates,
            moves = applied.moves,
            deletes = applied.deletes,
            skipped = applied.skipped,
            "transaction commit"
        );
        Ok(CommitSummary {
            operations,
            applied,
            elapsed,
        })
    }

    /// Discard the transaction without touching the base layer
    ///
    /// Rolling back an idle overlay is a no-op.
    pub fn rollback(&mut self) {
        if self.is_active() {
            debug!(txn_ops = self.ops.len(), "transaction rollback");
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.status = TransactionStatus::Idle;
        self.nodes.clear();
        self.deleted.clear();
        self.touched.clear();
        self.ops.clear();
        self.aliases.clear();
        self.started_at = None;
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether a transaction is open
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Fail unless a transaction is open
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::NoActiveTransaction)
        }
    }

    /// Time since `begin()`, if active
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    // === Aliases ===

    /// Register an alias for the rest of this transaction
    pub fn set_alias(&mut self, name: impl Into<String>, id: NodeId) -> Result<()> {
        self.ensure_active()?;
        self.aliases.set(name, id);
        Ok(())
    }

    /// Resolve an alias (or pass an identifier through)
    pub fn resolve(&self, id_or_alias: &str) -> NodeId {
        self.aliases.resolve(id_or_alias)
    }

    /// The alias table
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    // === Reads ===

    /// Resolve a node through the overlay, falling back to `base`
    pub fn get<'a>(&'a self, base: &'a NodeStore, id: &str) -> Option<&'a Node> {
        let id = self.resolve(id);
        if self.deleted.contains(&id) {
            return None;
        }
        self.nodes.get(&id).or_else(|| base.get(&id))
    }

    /// Whether a node is visible in the resolved view
    pub fn contains(&self, base: &NodeStore, id: &str) -> bool {
        self.get(base, id).is_some()
    }

    /// Whether the overlay holds its own copy of `id`
    pub fn holds(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether `id` was deleted in this transaction
    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    /// Nodes created or modified in this transaction
    pub fn overlay_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Identifiers deleted in this transaction
    pub fn deleted_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.deleted.iter()
    }

    /// Number of nodes held in the overlay
    pub fn overlay_len(&self) -> usize {
        self.nodes.len()
    }

    // === Writes ===

    /// Copy-on-write access to a node
    ///
    /// The first write in a transaction clones the base node into the overlay
    /// and bumps its version; later writes mutate the same copy.
    ///
    /// # Errors
    /// - `Error::NoActiveTransaction` outside a transaction
    /// - `Error::NodeNotFound` if the node is absent or deleted
    pub fn write(&mut self, base: &NodeStore, id: &str) -> Result<&mut Node> {
        self.ensure_active()?;
        let id = self.resolve(id);
        if self.deleted.contains(&id) {
            return Err(Error::NodeNotFound(id));
        }
        if !self.nodes.contains_key(&id) {
            let mut copy = base.get(&id).cloned().ok_or_else(|| Error::NodeNotFound(id.clone()))?;
            copy.version += 1;
            self.nodes.insert(id.clone(), copy);
        }
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NodeNotFound(id.clone()))?;
        node.updated_at = Some(Timestamp::now());
        Ok(node)
    }

    /// Place a brand-new node into the overlay
    ///
    /// The node must carry an assigned identifier. Identifiers deleted earlier
    /// in the same transaction stay reserved until commit, since deletes
    /// replay after creates.
    ///
    /// # Errors
    /// `Error::DuplicateId` if the identifier is visible or was deleted in
    /// this transaction.
    pub fn insert_new(&mut self, base: &NodeStore, mut node: Node) -> Result<&Node> {
        self.ensure_active()?;
        if self.deleted.contains(&node.sid) || self.contains(base, &node.sid) {
            return Err(Error::DuplicateId(node.sid));
        }
        let now = Timestamp::now();
        node.version = 1;
        node.created_at = Some(now);
        node.updated_at = Some(now);
        let id = node.sid.clone();
        self.nodes.insert(id.clone(), node);
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }

    /// Remove a node from the resolved view
    ///
    /// Returns the last visible snapshot of the node.
    pub fn remove(&mut self, base: &NodeStore, id: &str) -> Result<Node> {
        self.ensure_active()?;
        let id = self.resolve(id);
        let snapshot = self
            .get(base, &id)
            .cloned()
            .ok_or_else(|| Error::NodeNotFound(id.clone()))?;
        self.nodes.remove(&id);
        self.touched.retain(|t| t != &id);
        self.deleted.insert(id);
        Ok(snapshot)
    }

    /// Mark a node for one consolidated `update` at flush time
    pub fn touch(&mut self, id: NodeId) {
        if !self.touched.contains(&id) {
            self.touched.push(id);
        }
    }

    /// Append an operation to the log
    pub fn record(&mut self, op: AtomicOperation) {
        self.ops.push(op);
    }

    /// Emit one `update` per touched node, in the order they were touched,
    /// then settle the logged moves against the resolved tree
    pub fn flush_touched(&mut self) {
        for id in std::mem::take(&mut self.touched) {
            if self.deleted.contains(&id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                self.ops.push(AtomicOperation::update(node.clone()));
            }
        }
        self.settle_moves();
    }

    /// Point every logged `move` at the index its node ends up at
    ///
    /// Replay positions a node by the last `move` naming it, so that move
    /// must agree with the final content of its parent. A node that later
    /// left the move's target keeps no `move` at all; its updates carry the
    /// structure. Moves of deleted nodes are left alone.
    fn settle_moves(&mut self) {
        let mut stale = HashSet::new();
        for op in &mut self.ops {
            let AtomicOperation::Move {
                node_id,
                parent_id,
                position,
                ..
            } = op
            else {
                continue;
            };
            if self.deleted.contains(&*node_id) {
                continue;
            }
            let listed_at = self
                .nodes
                .get(&*node_id)
                .filter(|n| n.parent_id.as_ref() == Some(&*parent_id))
                .and_then(|_| self.nodes.get(&*parent_id))
                .and_then(|p| p.children().iter().position(|c| *c == *node_id));
            match listed_at {
                Some(index) => *position = Some(index),
                None => {
                    stale.insert(node_id.clone());
                }
            }
        }
        if !stale.is_empty() {
            self.ops.retain(|op| {
                !matches!(op, AtomicOperation::Move { node_id, .. } if stale.contains(node_id))
            });
        }
    }

    // === Inspection ===

    /// The log so far (touched nodes not yet flushed)
    pub fn operations(&self) -> &[AtomicOperation] {
        &self.ops
    }

    /// Identifiers awaiting a consolidated update
    pub fn touched(&self) -> &[NodeId] {
        &self.touched
    }

    /// Per-kind counts of the buffered log
    pub fn pending_operations(&self) -> PendingOperations {
        let mut pending = PendingOperations::default();
        for op in &self.ops {
            match op.kind() {
                OperationKind::Create => pending.creates += 1,
                OperationKind::Update => pending.updates += 1,
                OperationKind::Move => pending.moves += 1,
                OperationKind::Delete => pending.deletes += 1,
            }
        }
        pending
    }
}
