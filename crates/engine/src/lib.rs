//! Document store engine for Verso
//!
//! This crate assembles the lower layers into [`DocumentStore`]:
//! - Transactions over the copy-on-write overlay (begin/end/commit/rollback)
//! - Tree mutations: add/remove/move/reorder/copy/clone/transform
//! - Mark operations across one or several text nodes
//! - Queries over the resolved view
//! - The operation event channel and remote replay
//! - Load/export in flat and nested form, plus a lazy node view
//! - Configuration via `verso.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod events;
pub mod loader;
pub mod marks;
pub mod query;
pub mod store;
pub mod tree;
pub mod update;

pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use events::{EventChannel, Listener, ListenerId};
pub use loader::{NodeTree, NodeView};
pub use marks::{TextPosition, TextRange};
pub use store::DocumentStore;
pub use tree::ChildRef;
pub use update::{FieldUpdate, NodeUpdate};
