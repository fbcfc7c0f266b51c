//! Verso - a normalized, transactional store for tree-shaped rich documents
//!
//! Nodes live in a flat map and reference their children by identifier.
//! Mutations run inside transactions over a copy-on-write overlay, and
//! every transaction produces an ordered operation log that collaboration
//! layers can replicate.
//!
//! # Quick Start
//!
//! ```
//! use verso::{DocumentStore, Mark, Node, TextRange};
//!
//! let mut store = DocumentStore::new();
//! store.begin()?;
//! let root = store.create_node(Node::container("doc"), false)?.accepted().unwrap();
//! let para = store.add_child(&root, Node::text("paragraph", "Hello World"), None)?;
//! store.apply_mark(&TextRange::within(para.clone(), 0, 5), &Mark::full("bold"))?;
//! store.commit()?;
//! store.set_root(&root)?;
//!
//! assert_eq!(store.get_node(&para).unwrap().marks.len(), 1);
//! # Ok::<(), verso::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `verso-core`: data model, identifiers, errors, mark algebra
//! - `verso-storage`: the committed node map and operation replay
//! - `verso-concurrency`: the transactional overlay and the store lock
//! - `verso-engine`: the [`DocumentStore`] facade

pub use verso_concurrency::{
    CommitSummary, LockConfig, LockManager, LockStats, LockToken, PendingOperations,
};
pub use verso_core::marks;
pub use verso_core::{
    AtomicOperation, Attributes, Error, IdGenerator, Mark, MarkRange, Node, NodeId,
    OperationKind, Result, SchemaValidator, Timestamp, Validated, ValidationResult,
};
pub use verso_engine::{
    ChildRef, DocumentStore, FieldUpdate, ListenerId, NodeTree, NodeUpdate, NodeView,
    StoreConfig, TextPosition, TextRange, CONFIG_FILE_NAME,
};
pub use verso_storage::{ApplyResult, NodeStore};
