//! Operation event channel
//!
//! Listeners receive committed operations synchronously, in registration
//! order. A collaboration adapter that re-applies a peer's operations
//! suspends the channel so the same operations are not broadcast back out.
//! Suspension nests: each `suspend` needs a matching `resume`.

use std::fmt;

use verso_core::AtomicOperation;

/// Token returned by `on_operation`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw token value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Operation listener callback
pub type Listener = Box<dyn FnMut(&AtomicOperation) + Send>;

/// Ordered listener registry
#[derive(Default)]
pub struct EventChannel {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    suspended: usize,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listeners.len())
            .field("suspended", &self.suspended)
            .finish()
    }
}

impl EventChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn on_operation<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&AtomicOperation) + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener; returns false for unknown tokens
    pub fn off_operation(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Notify every listener, unless suspended
    ///
    /// Returns whether the operation was delivered.
    pub fn emit(&mut self, op: &AtomicOperation) -> bool {
        if self.is_suspended() {
            return false;
        }
        for (_, listener) in self.listeners.iter_mut() {
            listener(op);
        }
        true
    }

    /// Stop delivering operations until the matching `resume`
    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    /// Undo one `suspend`
    pub fn resume(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    /// Whether delivery is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
