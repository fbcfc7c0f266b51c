//! Transaction-local alias table
//!
//! Callers may register a symbolic name for a node inside a transaction and
//! then pass the name wherever an identifier is expected. The table is owned
//! by the overlay and cleared at every transaction boundary.

use std::collections::HashMap;

use verso_core::NodeId;

/// Scoped name → identifier mapping
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, NodeId>,
}

impl AliasTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an alias
    pub fn set(&mut self, name: impl Into<String>, id: NodeId) -> Option<NodeId> {
        self.aliases.insert(name.into(), id)
    }

    /// Remove an alias
    pub fn remove(&mut self, name: &str) -> Option<NodeId> {
        self.aliases.remove(name)
    }

    /// Look up an alias
    pub fn get(&self, name: &str) -> Option<&NodeId> {
        self.aliases.get(name)
    }

    /// Resolve `id_or_alias` to a concrete identifier
    ///
    /// Strings that are not registered aliases are returned unchanged.
    pub fn resolve(&self, id_or_alias: &str) -> NodeId {
        self.aliases
            .get(id_or_alias)
            .cloned()
            .unwrap_or_else(|| NodeId::new(id_or_alias))
    }

    /// Number of registered aliases
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether no aliases are registered
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Drop every alias
    pub fn clear(&mut self) {
        self.aliases.clear();
    }
}
