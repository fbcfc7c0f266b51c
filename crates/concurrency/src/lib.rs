//! Concurrency layer for Verso
//!
//! This crate holds everything that isolates in-progress work from the
//! committed base layer:
//! - Overlay: copy-on-write transaction state and the operation log
//! - AliasTable: transaction-scoped symbolic names for nodes
//! - LockManager: a FIFO exclusive lock with wait and hold timeouts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod lock;
pub mod overlay;

pub use alias::AliasTable;
pub use lock::{HeldLock, LockConfig, LockManager, LockStats, LockToken, QueuedLock};
pub use overlay::{CommitSummary, Overlay, PendingOperations, TransactionStatus};
