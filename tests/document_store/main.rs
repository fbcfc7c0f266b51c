//! Document Store Integration Tests
//!
//! End-to-end behavior of `DocumentStore` across the core, storage,
//! concurrency and engine crates.

#[path = "../common/mod.rs"]
mod common;

mod locking;
mod marks;
mod transactions;
mod tree_operations;
