//! Core types for Verso
//!
//! This crate defines the foundational types used throughout the store:
//! - NodeId, Node, Mark, MarkRange: the normalized document data model
//! - AtomicOperation: one recorded effect in a transaction's log
//! - IdGenerator: session-scoped `session:counter` identifiers
//! - Error: structural error hierarchy
//! - ValidationResult / SchemaValidator: business-rule outcomes and the schema seam
//! - marks: the mark range algebra (pure functions)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod marks;
pub mod operation;
pub mod timestamp;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use id::{IdGenerator, DEFAULT_SESSION_ID};
pub use operation::{replay_order, AtomicOperation, OperationKind};
pub use timestamp::Timestamp;
pub use types::{Attributes, Mark, MarkRange, Node, NodeId};
pub use validation::{validate_with, SchemaValidator, Validated, ValidationResult};
