//! Error types for the document store
//!
//! Structural violations (missing parent, missing child, deleting the root,
//! misuse of the transaction lifecycle) are raised as [`Error`]. They are
//! caller errors, not business outcomes. Business-rule validations are
//! reported through [`crate::ValidationResult`] instead and never appear here.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::time::Duration;
use thiserror::Error;

use crate::types::NodeId;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document store
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced node does not exist in the resolved view
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Parent of an add/move/reorder does not exist
    #[error("Parent node not found: {0}")]
    ParentNotFound(NodeId),

    /// Identifier is not a child of the given parent
    #[error("Node {child} is not a child of {parent}")]
    NotAChild {
        /// Parent whose content was searched
        parent: NodeId,
        /// Identifier that was expected among its children
        child: NodeId,
    },

    /// Node is already listed in another parent's content
    #[error("Node {child} is already attached to {parent}")]
    AlreadyAttached {
        /// Node being attached
        child: NodeId,
        /// Parent that currently owns it
        parent: NodeId,
    },

    /// Creation with an identifier that is already taken
    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),

    /// Attempt to delete the current root
    #[error("Cannot delete root node {0}")]
    RootDeletion(NodeId),

    /// Move would make a node its own ancestor
    #[error("Cannot move {node} under its own descendant {target}")]
    CycleDetected {
        /// Node being moved
        node: NodeId,
        /// Requested new parent
        target: NodeId,
    },

    /// `begin()` while a transaction is already active
    #[error("A transaction is already active")]
    TransactionActive,

    /// Mutation or commit without an active transaction
    #[error("No active transaction")]
    NoActiveTransaction,

    /// Lock wait exceeded its timeout
    #[error("Lock wait for {owner} timed out after {waited:?}")]
    LockTimeout {
        /// Owner that was waiting
        owner: String,
        /// How long it waited
        waited: Duration,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Identifier of the offending node, for structural errors
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Error::NodeNotFound(id)
            | Error::ParentNotFound(id)
            | Error::DuplicateId(id)
            | Error::RootDeletion(id) => Some(id),
            Error::NotAChild { child, .. } | Error::AlreadyAttached { child, .. } => Some(child),
            Error::CycleDetected { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
