//! Session-scoped identifier generation
//!
//! Identifiers have the shape `"{session_id}:{counter}"`. Each session owns a
//! disjoint namespace, so stores run by different sessions can merge
//! operation logs by identifier without renaming. The generator is an
//! explicit value owned by its store; there is no process-global counter.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Default session namespace
pub const DEFAULT_SESSION_ID: u64 = 1;

/// Generator of `session:counter` node identifiers
///
/// # Invariants
///
/// - For a fixed session, generated identifiers are strictly increasing in
///   their counter and never reused.
/// - The counter is never reset, including across `set_session_id` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    session_id: u64,
    counter: u64,
}

impl IdGenerator {
    /// Create a generator for a session, starting at counter 0
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            counter: 0,
        }
    }

    /// Mint the next identifier
    pub fn generate(&mut self) -> NodeId {
        self.counter += 1;
        NodeId::new(format!("{}:{}", self.session_id, self.counter))
    }

    /// Switch the session namespace
    pub fn set_session_id(&mut self, session_id: u64) {
        self.session_id = session_id;
    }

    /// Current session namespace
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Last counter value handed out
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Advance the counter past an identifier minted elsewhere
    ///
    /// Loading a persisted document must not let the generator re-mint an
    /// identifier that already exists. Identifiers from other sessions or
    /// not in `session:counter` form are ignored.
    pub fn observe(&mut self, id: &str) {
        if let Some((session, counter)) = parse_generated(id) {
            if session == self.session_id && counter > self.counter {
                self.counter = counter;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_ID)
    }
}

/// Split a generated identifier into `(session, counter)`
pub fn parse_generated(id: &str) -> Option<(u64, u64)> {
    let (session, counter) = id.split_once(':')?;
    Some((session.parse().ok()?, counter.parse().ok()?))
}
