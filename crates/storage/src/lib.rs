//! Storage layer for Verso
//!
//! This crate implements the committed base layer:
//! - NodeStore: BTreeMap-based identifier → node map
//! - ApplyResult: per-kind counts from replaying an operation log
//!
//! The base layer is mutated only by commit replay, remote replay, and the
//! non-transactional bulk-loading path.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod node_store;

pub use node_store::{ApplyResult, NodeStore};
