//! DocumentStore: the store facade
//!
//! `DocumentStore` owns the committed [`NodeStore`], the transactional
//! [`Overlay`] above it, the identifier generator, the optional schema
//! validator, the event channel and the lock manager.
//!
//! ## Transaction flow
//!
//! ```text
//! begin()
//!   mutation primitives → read through the overlay, copy-on-write,
//!                         append to the operation log
//! end()      → flushed log, overlay kept for inspection
//! commit()   → replay create → update → move → delete, notify listeners
//! rollback() → discard
//! ```
//!
//! Reads work at any time. Every mutation requires an active transaction,
//! except the bulk-loading paths (`set_node`, `load_tree`, `load_flat`) and
//! remote replay, which write the base layer directly.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use verso_concurrency::{
    CommitSummary, LockManager, LockStats, LockToken, Overlay, PendingOperations,
};
use verso_core::marks::normalize_marks;
use verso_core::{
    validate_with, AtomicOperation, Error, IdGenerator, Node, NodeId, Result, SchemaValidator,
    Timestamp, Validated, ValidationResult,
};
use verso_storage::{ApplyResult, NodeStore};

use crate::config::StoreConfig;
use crate::events::{EventChannel, ListenerId};
use crate::update::NodeUpdate;

/// Normalized transactional document store
pub struct DocumentStore {
    pub(crate) base: NodeStore,
    pub(crate) overlay: Overlay,
    ids: IdGenerator,
    schema: Option<Arc<dyn SchemaValidator>>,
    root: Option<NodeId>,
    events: EventChannel,
    locks: LockManager,
    config: StoreConfig,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("nodes", &self.base.count())
            .field("root", &self.root)
            .field("transaction", &self.overlay.status())
            .field("ids", &self.ids)
            .field("schema", &self.schema.is_some())
            .field("events", &self.events)
            .finish()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy of the committed state
///
/// The node map is copied and the schema is shared. The clone starts with
/// no open transaction, no listeners and its own lock.
impl Clone for DocumentStore {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            overlay: Overlay::new(),
            ids: self.ids.clone(),
            schema: self.schema.clone(),
            root: self.root.clone(),
            events: EventChannel::new(),
            locks: LockManager::new(self.config.lock_config()),
            config: self.config.clone(),
        }
    }
}

impl DocumentStore {
    // === Construction ===

    /// Empty store with default configuration
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Empty store with the given configuration
    ///
    /// # Errors
    /// `Error::Config` if the configuration is out of range.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Empty store configured from a `verso.toml` file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Self::with_config(StoreConfig::from_file(path)?)
    }

    fn build(config: StoreConfig) -> Self {
        Self {
            base: NodeStore::new(),
            overlay: Overlay::new(),
            ids: IdGenerator::new(config.session_id),
            schema: None,
            root: None,
            events: EventChannel::new(),
            locks: LockManager::new(config.lock_config()),
            config,
        }
    }

    /// Attach a schema validator
    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Replace (or remove) the schema validator
    pub fn set_schema(&mut self, schema: Option<Arc<dyn SchemaValidator>>) {
        self.schema = schema;
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // === Identifiers ===

    /// Mint a fresh identifier
    pub fn generate_id(&mut self) -> NodeId {
        self.ids.generate()
    }

    /// Switch the identifier namespace
    pub fn set_session_id(&mut self, session_id: u64) {
        self.ids.set_session_id(session_id);
    }

    /// The identifier generator
    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    pub(crate) fn assign_id(&mut self, node: &mut Node) {
        if node.sid.is_empty() {
            node.sid = self.ids.generate();
        } else {
            self.ids.observe(&node.sid);
        }
    }

    // === Root ===

    /// Designate the document root
    pub fn set_root(&mut self, id: &str) -> Result<()> {
        let id = self.resolve(id);
        if !self.contains(&id) {
            return Err(Error::NodeNotFound(id));
        }
        self.root = Some(id);
        Ok(())
    }

    /// Current root, if designated
    pub fn root_id(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    // === Transactions ===

    /// Open a transaction
    ///
    /// # Errors
    /// `Error::TransactionActive` if one is already open.
    pub fn begin(&mut self) -> Result<()> {
        self.overlay.begin()
    }

    /// Flush pending parent updates and return the log, keeping the overlay
    pub fn end(&mut self) -> Result<Vec<AtomicOperation>> {
        self.overlay.end()
    }

    /// Replay the transaction into the base layer and notify listeners
    pub fn commit(&mut self) -> Result<CommitSummary> {
        let summary = self.overlay.commit(&mut self.base)?;
        if self.root.as_ref().is_some_and(|r| !self.base.contains(r)) {
            self.root = None;
        }
        for op in &summary.operations {
            self.events.emit(op);
        }
        info!(
            txn_ops = summary.operations.len(),
            applied = summary.applied.total_operations(),
            elapsed_us = summary.elapsed.as_micros() as u64,
            "committed"
        );
        Ok(summary)
    }

    /// Discard the transaction
    pub fn rollback(&mut self) {
        self.overlay.rollback();
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.overlay.is_active()
    }

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "transaction closure failed, rolling back");
                self.rollback();
                Err(e)
            }
        }
    }

    /// Per-kind counts of the uncommitted log
    pub fn pending_operations(&self) -> PendingOperations {
        self.overlay.pending_operations()
    }

    /// The uncommitted log (parent updates appear after `end()`)
    pub fn operations(&self) -> &[AtomicOperation] {
        self.overlay.operations()
    }

    // === Aliases ===

    /// Register a transaction-local alias
    pub fn set_alias(&mut self, name: impl Into<String>, id: &str) -> Result<()> {
        let id = self.resolve(id);
        self.overlay.set_alias(name, id)
    }

    /// Resolve an alias, passing plain identifiers through
    pub fn resolve(&self, id_or_alias: &str) -> NodeId {
        self.overlay.resolve(id_or_alias)
    }

    // === Reads ===

    /// Resolve a node: deleted → none, overlay copy, then base copy
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.overlay.get(&self.base, id)
    }

    /// Whether a node is visible
    pub fn contains(&self, id: &str) -> bool {
        self.get_node(id).is_some()
    }

    /// The committed base layer
    pub fn base(&self) -> &NodeStore {
        &self.base
    }

    pub(crate) fn require(&self, id: &str) -> Result<&Node> {
        self.get_node(id)
            .ok_or_else(|| Error::NodeNotFound(self.resolve(id)))
    }

    pub(crate) fn require_parent(&self, id: &str) -> Result<NodeId> {
        let id = self.resolve(id);
        if self.contains(&id) {
            Ok(id)
        } else {
            Err(Error::ParentNotFound(id))
        }
    }

    // === Write primitives ===

    pub(crate) fn write(&mut self, id: &str) -> Result<&mut Node> {
        self.overlay.write(&self.base, id)
    }

    pub(crate) fn touch(&mut self, id: &NodeId) {
        self.overlay.touch(id.clone());
    }

    pub(crate) fn record(&mut self, op: AtomicOperation) {
        self.overlay.record(op);
    }

    /// Insert a new node into the overlay and log its creation
    ///
    /// Does not link it into the parent's content; callers do that.
    pub(crate) fn stage_new(
        &mut self,
        mut node: Node,
        parent: Option<NodeId>,
        position: Option<usize>,
    ) -> Result<NodeId> {
        self.assign_id(&mut node);
        node.marks = normalize_marks(node.text.as_deref(), &node.marks);
        node.parent_id = parent.clone();
        let snapshot = self.overlay.insert_new(&self.base, node)?.clone();
        let id = snapshot.sid.clone();
        self.record(AtomicOperation::create(snapshot, parent, position));
        Ok(id)
    }

    /// Insert `children` contiguously into `parent`'s content
    ///
    /// Returns the index the batch landed at.
    pub(crate) fn link_children(
        &mut self,
        parent: &NodeId,
        children: &[NodeId],
        position: Option<usize>,
    ) -> Result<usize> {
        let node = self.write(parent)?;
        let content = node.content_mut();
        let at = position.unwrap_or(content.len()).min(content.len());
        content.splice(at..at, children.iter().cloned());
        self.touch(parent);
        Ok(at)
    }

    // === Node CRUD ===

    /// Create a node in the current transaction
    ///
    /// An empty `sid` is replaced with a generated identifier. When the node
    /// names a `parent_id`, it is appended to that parent's content.
    /// With `validate`, a schema rejection is returned as `Rejected` and
    /// nothing is written.
    pub fn create_node(&mut self, mut node: Node, validate: bool) -> Result<Validated<NodeId>> {
        self.overlay.ensure_active()?;
        self.assign_id(&mut node);
        if validate {
            let result = validate_with(self.schema.as_deref(), &node);
            if !result.is_valid() {
                return Ok(Validated::Rejected(result));
            }
        }
        let parent = match node.parent_id.take() {
            Some(p) => Some(self.require_parent(&p)?),
            None => None,
        };
        let id = match parent {
            Some(parent) => {
                let at = self.get_node(&parent).map_or(0, |p| p.children().len());
                let id = self.stage_new(node, Some(parent.clone()), Some(at))?;
                self.link_children(&parent, std::slice::from_ref(&id), Some(at))?;
                id
            }
            None => self.stage_new(node, None, None)?,
        };
        Ok(Validated::Accepted(id))
    }

    /// `create_node` with the configured default validation
    pub fn create(&mut self, node: Node) -> Result<Validated<NodeId>> {
        let validate = self.config.validate_on_write;
        self.create_node(node, validate)
    }

    /// Write a node straight into the base layer, bypassing the overlay
    ///
    /// Intended for tests and bulk loading. Marks are normalized and a
    /// missing identifier is generated, but no operation is logged.
    pub fn set_node(&mut self, mut node: Node, validate: bool) -> Result<Validated<NodeId>> {
        self.assign_id(&mut node);
        if validate {
            let result = validate_with(self.schema.as_deref(), &node);
            if !result.is_valid() {
                return Ok(Validated::Rejected(result));
            }
        }
        node.marks = normalize_marks(node.text.as_deref(), &node.marks);
        let now = Timestamp::now();
        node.version = node.version.max(1);
        node.created_at.get_or_insert(now);
        node.updated_at.get_or_insert(now);
        let id = node.sid.clone();
        self.base.set(node);
        Ok(Validated::Accepted(id))
    }

    /// Update a node's non-structural fields
    ///
    /// Business failures come back as an invalid `ValidationResult`:
    /// - the node does not exist
    /// - the update would change `stype`
    /// - the schema rejects the result (with `validate`)
    pub fn update_node(
        &mut self,
        id: &str,
        update: NodeUpdate,
        validate: bool,
    ) -> Result<ValidationResult> {
        self.overlay.ensure_active()?;
        let id = self.resolve(id);
        let Some(current) = self.get_node(&id) else {
            return Ok(ValidationResult::invalid(format!("Node not found: {}", id)));
        };
        if let Some(stype) = &update.stype {
            if stype != &current.stype {
                return Ok(ValidationResult::invalid(format!(
                    "Cannot change type of {} from {} to {} through update; use transform_node",
                    id, current.stype, stype
                )));
            }
        }

        let mut candidate = current.clone();
        update.apply_to(&mut candidate);
        candidate.marks = normalize_marks(candidate.text.as_deref(), &candidate.marks);
        if validate {
            let result = validate_with(self.schema.as_deref(), &candidate);
            if !result.is_valid() {
                return Ok(result);
            }
        }

        let node = self.write(&id)?;
        candidate.version = node.version;
        candidate.updated_at = node.updated_at;
        *node = candidate;
        self.touch(&id);
        Ok(ValidationResult::ok())
    }

    /// Delete a node and its whole subtree
    ///
    /// The node is detached from its parent and one `delete` is logged per
    /// removed node, descendants first.
    ///
    /// # Errors
    /// - `Error::RootDeletion` if the subtree contains the current root
    /// - `Error::NodeNotFound` if the node does not exist
    pub fn delete_node(&mut self, id: &str) -> Result<()> {
        self.overlay.ensure_active()?;
        let id = self.resolve(id);
        self.reject_root_deletion(&id)?;
        self.require(&id)?;
        self.delete_subtree(&id)
    }

    /// Delete several nodes (and their subtrees)
    ///
    /// All identifiers are checked against the root before anything is
    /// deleted. Identifiers already removed as part of an earlier subtree in
    /// the same call are skipped.
    pub fn delete_nodes(&mut self, ids: &[&str]) -> Result<usize> {
        self.overlay.ensure_active()?;
        let ids: Vec<NodeId> = ids.iter().map(|id| self.resolve(id)).collect();
        for id in &ids {
            self.reject_root_deletion(id)?;
        }
        let mut deleted = 0;
        for id in &ids {
            if self.overlay.is_deleted(id) {
                continue;
            }
            self.require(id)?;
            self.delete_subtree(id)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    fn reject_root_deletion(&self, id: &NodeId) -> Result<()> {
        if let Some(root) = &self.root {
            if root == id || self.is_ancestor(id, root) {
                return Err(Error::RootDeletion(root.clone()));
            }
        }
        Ok(())
    }

    fn delete_subtree(&mut self, id: &NodeId) -> Result<()> {
        let parent = self.get_node(id).and_then(|n| n.parent_id.clone());
        if let Some(parent) = parent.filter(|p| self.contains(p)) {
            if self.get_node(&parent).is_some_and(|p| p.has_child(id)) {
                self.write(&parent)?.content_mut().retain(|c| c != id);
                self.touch(&parent);
            }
        }

        let mut doomed: Vec<NodeId> = self
            .descendants(id)
            .into_iter()
            .map(|n| n.sid.clone())
            .collect();
        doomed.reverse();
        doomed.push(id.clone());

        for node_id in doomed {
            self.overlay.remove(&self.base, &node_id)?;
            self.record(AtomicOperation::delete(node_id));
        }
        Ok(())
    }

    // === Events ===

    /// Register an operation listener
    pub fn on_operation<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&AtomicOperation) + Send + 'static,
    {
        self.events.on_operation(listener)
    }

    /// Unregister a listener
    pub fn off_operation(&mut self, id: ListenerId) -> bool {
        self.events.off_operation(id)
    }

    /// Notify listeners of an operation (dropped while suspended)
    pub fn emit_operation(&mut self, op: &AtomicOperation) -> bool {
        self.events.emit(op)
    }

    /// Stop notifying listeners until `resume_listeners`
    pub fn suspend_listeners(&mut self) {
        self.events.suspend();
    }

    /// Undo one `suspend_listeners`
    pub fn resume_listeners(&mut self) {
        self.events.resume();
    }

    /// Whether listener delivery is suspended
    pub fn listeners_suspended(&self) -> bool {
        self.events.is_suspended()
    }

    /// Run `f` with listeners suspended
    ///
    /// Delivery resumes when `f` returns or unwinds.
    pub fn with_listeners_suspended<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let mut guard = SuspendGuard::new(self);
        f(&mut *guard.store)
    }

    // === Remote replay ===

    /// Apply a peer's operations to the base layer
    ///
    /// Operations replay in canonical order with listeners suspended, so
    /// they are not broadcast back to the peer. Identifiers from the local
    /// session advance the generator.
    ///
    /// # Errors
    /// `Error::TransactionActive` while a local transaction is open.
    pub fn apply_remote_operations(&mut self, ops: &[AtomicOperation]) -> Result<ApplyResult> {
        if self.overlay.is_active() {
            return Err(Error::TransactionActive);
        }
        let result = self.with_listeners_suspended(|store| {
            for op in ops {
                store.ids.observe(op.node_id());
            }
            let result = store.base.apply_all(ops);
            for op in ops {
                store.emit_operation(op);
            }
            result
        });
        info!(
            remote_ops = ops.len(),
            applied = result.total_operations(),
            skipped = result.skipped,
            "applied remote operations"
        );
        Ok(result)
    }

    // === Locking ===

    /// Handle to the store lock
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Acquire the store lock
    pub async fn acquire_lock(&self, owner: impl Into<String>) -> Result<LockToken> {
        self.locks.acquire_lock(owner).await
    }

    /// Release the store lock
    pub fn release_lock(&self, lock_id: u64) -> bool {
        self.locks.release_lock(lock_id)
    }

    /// Lock activity snapshot
    pub fn lock_stats(&self) -> LockStats {
        self.locks.stats()
    }
}

/// Holds one listener suspension for as long as it lives
struct SuspendGuard<'a> {
    store: &'a mut DocumentStore,
}

impl<'a> SuspendGuard<'a> {
    fn new(store: &'a mut DocumentStore) -> Self {
        store.events.suspend();
        Self { store }
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.store.events.resume();
    }
}
