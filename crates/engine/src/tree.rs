//! Tree mutation operations
//!
//! Structural primitives built on the overlay's read/write path. Each one
//! keeps the tree invariants intact:
//! - a node is listed in at most one parent's `content`
//! - `parent_id` agrees with the owning parent
//! - no node becomes its own ancestor
//!
//! Parents whose `content` changes are touched, not logged directly; the
//! overlay emits one consolidated `update` per touched node when the log is
//! flushed. Moves additionally log a `move` carrying the target parent and
//! the index the node landed at.
//!
//! Positions past the end of a parent's content append.

use std::collections::{HashMap, HashSet};

use verso_core::{AtomicOperation, Attributes, Error, Node, NodeId, Result, ValidationResult};

use crate::store::DocumentStore;

/// A child passed to `add_child`/`add_children`
#[derive(Debug, Clone, PartialEq)]
pub enum ChildRef {
    /// A node that already exists (and is not attached elsewhere)
    Existing(NodeId),
    /// A node to create; an empty `sid` gets a generated identifier
    New(Node),
}

impl From<Node> for ChildRef {
    fn from(node: Node) -> Self {
        ChildRef::New(node)
    }
}

impl From<NodeId> for ChildRef {
    fn from(id: NodeId) -> Self {
        ChildRef::Existing(id)
    }
}

impl From<&NodeId> for ChildRef {
    fn from(id: &NodeId) -> Self {
        ChildRef::Existing(id.clone())
    }
}

impl From<&str> for ChildRef {
    fn from(id: &str) -> Self {
        ChildRef::Existing(NodeId::new(id))
    }
}

impl DocumentStore {
    /// Insert one child into `parent_id`'s content
    ///
    /// Returns the child's identifier (generated for new nodes).
    pub fn add_child(
        &mut self,
        parent_id: &str,
        child: impl Into<ChildRef>,
        position: Option<usize>,
    ) -> Result<NodeId> {
        let parent = self.resolve(parent_id);
        self.add_children(&parent, vec![child.into()], position)?
            .pop()
            .ok_or(Error::ParentNotFound(parent))
    }

    /// Insert a batch of children contiguously at `position`
    ///
    /// The batch keeps its order. Every child is checked before anything is
    /// written, so a failed batch leaves the transaction untouched.
    ///
    /// # Errors
    /// - `Error::ParentNotFound` if the parent does not exist
    /// - `Error::DuplicateId` if an identifier appears twice in the batch, or
    ///   a new child's identifier is already taken in this transaction
    /// - `Error::NodeNotFound` for an unknown existing child
    /// - `Error::AlreadyAttached` if an existing child is owned by a parent
    /// - `Error::CycleDetected` if a child is the parent or one of its ancestors
    pub fn add_children(
        &mut self,
        parent_id: &str,
        children: Vec<ChildRef>,
        position: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        self.overlay.ensure_active()?;
        let parent = self.require_parent(parent_id)?;

        let mut staged = Vec::with_capacity(children.len());
        for child in children {
            let child = match child {
                ChildRef::New(mut node) => {
                    self.assign_id(&mut node);
                    if self.contains(&node.sid) || self.overlay.is_deleted(&node.sid) {
                        return Err(Error::DuplicateId(node.sid));
                    }
                    ChildRef::New(node)
                }
                ChildRef::Existing(id) => {
                    let id = self.resolve(&id);
                    self.check_attachable(&id, &parent)?;
                    ChildRef::Existing(id)
                }
            };
            staged.push(child);
        }
        let ids: Vec<NodeId> = staged
            .iter()
            .map(|child| match child {
                ChildRef::New(node) => node.sid.clone(),
                ChildRef::Existing(id) => id.clone(),
            })
            .collect();
        reject_repeats(&ids)?;

        let len = self.get_node(&parent).map_or(0, |p| p.children().len());
        let at = position.unwrap_or(len).min(len);
        for (offset, child) in staged.into_iter().enumerate() {
            match child {
                ChildRef::New(node) => {
                    self.stage_new(node, Some(parent.clone()), Some(at + offset))?;
                }
                ChildRef::Existing(id) => {
                    self.write(&id)?.parent_id = Some(parent.clone());
                    self.touch(&id);
                }
            }
        }
        self.link_children(&parent, &ids, Some(at))?;
        Ok(ids)
    }

    /// Remove the edge between `parent_id` and `child_id`
    ///
    /// Returns false if the child was not listed. The child node survives.
    pub fn remove_child(&mut self, parent_id: &str, child_id: &str) -> Result<bool> {
        Ok(self.remove_children(parent_id, &[child_id])? > 0)
    }

    /// Remove several edges; identifiers not listed are ignored
    ///
    /// Returns the number of entries removed from the parent's content.
    pub fn remove_children(&mut self, parent_id: &str, child_ids: &[&str]) -> Result<usize> {
        self.overlay.ensure_active()?;
        let parent = self.require_parent(parent_id)?;
        let targets: Vec<NodeId> = {
            let parent_node = self.require(&parent)?;
            child_ids
                .iter()
                .map(|id| self.resolve(id))
                .filter(|id| parent_node.has_child(id))
                .collect()
        };
        if targets.is_empty() {
            return Ok(0);
        }

        let content = self.write(&parent)?.content_mut();
        let before = content.len();
        content.retain(|c| !targets.contains(c));
        let removed = before - content.len();
        self.touch(&parent);

        for id in &targets {
            let owned = self
                .get_node(id)
                .is_some_and(|n| n.parent_id.as_ref() == Some(&parent));
            if owned {
                self.write(id)?.parent_id = None;
                self.touch(id);
            }
        }
        Ok(removed)
    }

    /// Move a node under a new parent
    ///
    /// Updates the old parent, the new parent and the node, and logs one
    /// `move`.
    ///
    /// # Errors
    /// - `Error::NodeNotFound` if the node does not exist
    /// - `Error::ParentNotFound` if the new or current parent does not exist
    /// - `Error::CycleDetected` if the target is the node or a descendant
    pub fn move_node(&mut self, node_id: &str, new_parent_id: &str, position: Option<usize>) -> Result<()> {
        self.overlay.ensure_active()?;
        let id = self.resolve(node_id);
        let old = self.require(&id)?.parent_id.clone();
        let target = self.require_parent(new_parent_id)?;
        if let Some(old) = &old {
            if !self.contains(old) {
                return Err(Error::ParentNotFound(old.clone()));
            }
        }
        self.check_no_cycle(&id, &target)?;

        if let Some(old) = &old {
            self.detach(&id, old)?;
        }
        let at = self.link_children(&target, std::slice::from_ref(&id), position)?;
        self.write(&id)?.parent_id = Some(target.clone());
        self.touch(&id);
        self.record(AtomicOperation::move_to(id, target, Some(at)));
        Ok(())
    }

    /// Move several children of one parent to another, keeping their order
    ///
    /// # Errors
    /// As `move_node`, plus `Error::NotAChild` if an identifier is not a
    /// child of `from_parent_id` and `Error::DuplicateId` if one is listed
    /// twice.
    pub fn move_children(
        &mut self,
        from_parent_id: &str,
        to_parent_id: &str,
        child_ids: &[&str],
        position: Option<usize>,
    ) -> Result<()> {
        self.overlay.ensure_active()?;
        let from = self.require_parent(from_parent_id)?;
        let to = self.require_parent(to_parent_id)?;
        let ids: Vec<NodeId> = child_ids.iter().map(|id| self.resolve(id)).collect();
        reject_repeats(&ids)?;
        for id in &ids {
            if !self.require(&from)?.has_child(id) {
                return Err(Error::NotAChild {
                    parent: from.clone(),
                    child: id.clone(),
                });
            }
            self.require(id)?;
            self.check_no_cycle(id, &to)?;
        }
        if ids.is_empty() {
            return Ok(());
        }

        self.write(&from)?.content_mut().retain(|c| !ids.contains(c));
        self.touch(&from);
        let at = self.link_children(&to, &ids, position)?;
        for (offset, id) in ids.into_iter().enumerate() {
            self.write(&id)?.parent_id = Some(to.clone());
            self.touch(&id);
            self.record(AtomicOperation::move_to(id, to.clone(), Some(at + offset)));
        }
        Ok(())
    }

    /// Replace a parent's content wholesale
    ///
    /// Every identifier must already be a child; duplicates are kept as given.
    pub fn reorder_children(&mut self, parent_id: &str, new_order: &[&str]) -> Result<()> {
        self.overlay.ensure_active()?;
        let parent = self.require_parent(parent_id)?;
        let order: Vec<NodeId> = new_order.iter().map(|id| self.resolve(id)).collect();
        {
            let parent_node = self.require(&parent)?;
            if let Some(stranger) = order.iter().find(|id| !parent_node.has_child(id)) {
                return Err(Error::NotAChild {
                    parent: parent.clone(),
                    child: stranger.clone(),
                });
            }
        }
        *self.write(&parent)?.content_mut() = order;
        self.touch(&parent);
        Ok(())
    }

    /// Copy a single node under a fresh identifier
    ///
    /// Attributes, text and marks are copied; children are not. The copy
    /// goes under `new_parent_id` if given, otherwise under the source's
    /// parent, right after the source.
    pub fn copy_node(&mut self, node_id: &str, new_parent_id: Option<&str>) -> Result<NodeId> {
        self.overlay.ensure_active()?;
        let source = self.require(node_id)?.clone();
        let (parent, position) = self.copy_target(&source, new_parent_id)?;
        let subtree = HashMap::new();
        self.copy_into(&source, &subtree, parent, position)
    }

    /// Copy a node and its whole subtree under fresh identifiers
    ///
    /// Relative structure and sibling order are preserved.
    pub fn clone_node_with_children(&mut self, node_id: &str, new_parent_id: Option<&str>) -> Result<NodeId> {
        self.overlay.ensure_active()?;
        let source = self.require(node_id)?.clone();
        let (parent, position) = self.copy_target(&source, new_parent_id)?;
        let subtree: HashMap<NodeId, Node> = self
            .descendants(&source.sid)
            .into_iter()
            .map(|n| (n.sid.clone(), n.clone()))
            .collect();
        self.copy_into(&source, &subtree, parent, position)
    }

    /// Change a node's type in place, merging in `new_attrs`
    ///
    /// Same type is a successful no-op. A missing node is reported as an
    /// invalid result, not an error.
    pub fn transform_node(
        &mut self,
        node_id: &str,
        new_type: &str,
        new_attrs: Option<Attributes>,
    ) -> Result<ValidationResult> {
        self.overlay.ensure_active()?;
        let id = self.resolve(node_id);
        let Some(current) = self.get_node(&id) else {
            return Ok(ValidationResult::invalid(format!("Node not found: {}", id)));
        };
        if current.stype == new_type {
            return Ok(ValidationResult::ok());
        }

        let node = self.write(&id)?;
        node.stype = new_type.to_string();
        if let Some(attrs) = new_attrs {
            node.attributes.extend(attrs);
        }
        let snapshot = node.clone();
        self.record(AtomicOperation::update(snapshot));
        Ok(ValidationResult::ok())
    }

    // === Helpers ===

    fn check_no_cycle(&self, node: &NodeId, target: &NodeId) -> Result<()> {
        if node == target || self.is_ancestor(node, target) {
            return Err(Error::CycleDetected {
                node: node.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn check_attachable(&self, child: &NodeId, parent: &NodeId) -> Result<()> {
        self.require(child)?;
        self.check_no_cycle(child, parent)?;
        if let Some(owner) = self.owner_of(child) {
            return Err(Error::AlreadyAttached {
                child: child.clone(),
                parent: owner,
            });
        }
        Ok(())
    }

    /// The parent that lists `id` in its content, if any
    fn owner_of(&self, id: &NodeId) -> Option<NodeId> {
        let parent = self.get_node(id)?.parent_id.as_ref()?;
        self.get_node(parent)
            .filter(|p| p.has_child(id))
            .map(|p| p.sid.clone())
    }

    fn detach(&mut self, id: &NodeId, parent: &NodeId) -> Result<()> {
        if self.get_node(parent).is_some_and(|p| p.has_child(id)) {
            self.write(parent)?.content_mut().retain(|c| c != id);
            self.touch(parent);
        }
        Ok(())
    }

    fn copy_target(
        &self,
        source: &Node,
        new_parent_id: Option<&str>,
    ) -> Result<(Option<NodeId>, Option<usize>)> {
        let parent = match new_parent_id {
            Some(p) => Some(self.require_parent(p)?),
            None => source.parent_id.clone().filter(|p| self.contains(p)),
        };
        let position = parent
            .as_ref()
            .filter(|p| source.parent_id.as_ref() == Some(*p))
            .and_then(|p| self.get_node(p))
            .and_then(|p| p.children().iter().position(|c| c == &source.sid))
            .map(|i| i + 1);
        Ok((parent, position))
    }

    /// Stage a copy of `source` and, for deep copies, of every descendant
    /// found in `subtree`
    fn copy_into(
        &mut self,
        source: &Node,
        subtree: &HashMap<NodeId, Node>,
        parent: Option<NodeId>,
        position: Option<usize>,
    ) -> Result<NodeId> {
        let copy = Node {
            sid: NodeId::new(""),
            content: source.content.as_ref().map(|_| Vec::new()),
            parent_id: None,
            version: 0,
            created_at: None,
            updated_at: None,
            ..source.clone()
        };
        let at = parent.as_ref().map(|p| {
            let len = self.get_node(p).map_or(0, |n| n.children().len());
            position.unwrap_or(len).min(len)
        });
        let id = self.stage_new(copy, parent.clone(), at)?;
        if let Some(parent) = &parent {
            self.link_children(parent, std::slice::from_ref(&id), at)?;
        }
        for child in source.children() {
            if let Some(child_node) = subtree.get(child) {
                self.copy_into(child_node, subtree, Some(id.clone()), None)?;
            }
        }
        Ok(id)
    }
}

/// A batch may name each node once
fn reject_repeats(ids: &[NodeId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(*id)) {
        Some(id) => Err(Error::DuplicateId(id.clone())),
        None => Ok(()),
    }
}
