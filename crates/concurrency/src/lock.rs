//! Exclusive store lock with FIFO waiters
//!
//! A single lock guards the whole store against concurrent logical writers
//! (for example a local editor and a collaboration adapter). Waiters are
//! served strictly in arrival order. Every wait is bounded by
//! `wait_timeout`, and every hold is bounded by `max_hold`: a holder that
//! overstays is force-released and the next waiter is granted.
//!
//! ## Hand-off
//!
//! ```text
//! acquire_lock(owner)
//!   free and nobody queued → granted immediately
//!   otherwise              → queued, awaits a oneshot grant or the timeout
//!
//! release_lock(lock_id)
//!   token mismatch → no-op (returns false)
//!   otherwise      → pop waiters until one accepts the grant
//! ```
//!
//! State sits behind a `parking_lot::Mutex`. The guard is never held across
//! an `.await`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use verso_core::{Error, Result};

/// Default bound on how long `acquire_lock` waits
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default bound on how long a holder may keep the lock
pub const DEFAULT_MAX_HOLD: Duration = Duration::from_millis(50_000);

/// Lock timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Maximum time a caller waits in the queue
    pub wait_timeout: Duration,
    /// Maximum time a holder keeps the lock before it is force-released
    pub max_hold: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_hold: DEFAULT_MAX_HOLD,
        }
    }
}

/// Proof of lock ownership, returned by `acquire_lock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    /// Unique identifier of this grant
    pub lock_id: u64,
    /// Owner label supplied by the caller
    pub owner: String,
    /// When the lock was granted
    pub acquired_at: Instant,
}

/// The current holder, as reported by [`LockStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldLock {
    /// Grant identifier
    pub lock_id: u64,
    /// Owner label
    pub owner: String,
    /// How long the lock has been held, in milliseconds
    pub held_ms: u64,
}

/// A queued waiter, as reported by [`LockStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedLock {
    /// Grant identifier the waiter will receive
    pub lock_id: u64,
    /// Owner label
    pub owner: String,
    /// How long the waiter has been queued, in milliseconds
    pub waiting_ms: u64,
}

/// Snapshot of lock activity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    /// Grants issued
    pub total_acquisitions: u64,
    /// Releases by the holder
    pub total_releases: u64,
    /// Waits that ended in a timeout
    pub total_timeouts: u64,
    /// Holds cut short by `max_hold`
    pub forced_releases: u64,
    /// Mean time between request and grant, in milliseconds
    pub average_wait_time_ms: f64,
    /// Number of queued waiters
    pub queue_length: usize,
    /// Whether the lock is held
    pub is_locked: bool,
    /// Current holder
    pub current_lock: Option<HeldLock>,
    /// Queued waiters in service order
    pub queue: Vec<QueuedLock>,
}

struct Holder {
    lock_id: u64,
    owner: String,
    acquired_at: Instant,
}

struct Waiter {
    lock_id: u64,
    owner: String,
    enqueued_at: Instant,
    grant: oneshot::Sender<LockToken>,
}

#[derive(Default)]
struct LockState {
    holder: Option<Holder>,
    queue: VecDeque<Waiter>,
    acquisitions: u64,
    releases: u64,
    timeouts: u64,
    forced: u64,
    total_wait: Duration,
}

impl LockState {
    fn grant(&mut self, lock_id: u64, owner: String, waited: Duration) -> LockToken {
        let acquired_at = Instant::now();
        self.holder = Some(Holder {
            lock_id,
            owner: owner.clone(),
            acquired_at,
        });
        self.acquisitions += 1;
        self.total_wait += waited;
        LockToken {
            lock_id,
            owner,
            acquired_at,
        }
    }

    /// Clear the holder and pass the lock to the first live waiter
    fn hand_off(&mut self) -> Option<LockToken> {
        self.holder = None;
        while let Some(waiter) = self.queue.pop_front() {
            if waiter.grant.is_closed() {
                continue;
            }
            let waited = waiter.enqueued_at.elapsed();
            let token = self.grant(waiter.lock_id, waiter.owner, waited);
            match waiter.grant.send(token.clone()) {
                Ok(()) => return Some(token),
                Err(_) => {
                    // Receiver vanished between the check and the send.
                    self.holder = None;
                    self.acquisitions -= 1;
                    self.total_wait -= waited;
                }
            }
        }
        None
    }
}

struct LockInner {
    config: LockConfig,
    state: Mutex<LockState>,
    next_id: AtomicU64,
}

impl LockInner {
    fn force_release(self: &Arc<Self>, lock_id: u64) {
        let next = {
            let mut state = self.state.lock();
            let overdue = match &state.holder {
                Some(holder) if holder.lock_id == lock_id => holder,
                _ => return,
            };
            warn!(
                lock_id,
                owner = %overdue.owner,
                max_hold_ms = self.config.max_hold.as_millis() as u64,
                "lock held past max hold, forcing release"
            );
            state.forced += 1;
            state.hand_off()
        };
        if let Some(token) = next {
            spawn_watchdog(self, &token);
        }
    }

    /// Force-release an overdue holder without a runtime watchdog
    fn expire_overdue(self: &Arc<Self>) {
        let overdue = {
            let state = self.state.lock();
            state
                .holder
                .as_ref()
                .filter(|h| h.acquired_at.elapsed() >= self.config.max_hold)
                .map(|h| h.lock_id)
        };
        if let Some(lock_id) = overdue {
            self.force_release(lock_id);
        }
    }
}

fn spawn_watchdog(inner: &Arc<LockInner>, token: &LockToken) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let weak: Weak<LockInner> = Arc::downgrade(inner);
    let lock_id = token.lock_id;
    let max_hold = inner.config.max_hold;
    handle.spawn(async move {
        tokio::time::sleep(max_hold).await;
        if let Some(inner) = weak.upgrade() {
            inner.force_release(lock_id);
        }
    });
}

/// Store-wide exclusive lock
///
/// Cloning yields another handle to the same lock.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<LockInner>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LockManager")
            .field("config", &self.inner.config)
            .field("locked", &state.holder.is_some())
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl LockManager {
    /// Create an unlocked manager
    pub fn new(config: LockConfig) -> Self {
        Self {
            inner: Arc::new(LockInner {
                config,
                state: Mutex::new(LockState::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Timing configuration
    pub fn config(&self) -> LockConfig {
        self.inner.config
    }

    /// Acquire the lock, waiting in FIFO order
    ///
    /// # Errors
    /// `Error::LockTimeout` if the lock is not granted within `wait_timeout`.
    /// The waiter is removed from the queue on timeout.
    pub async fn acquire_lock(&self, owner: impl Into<String>) -> Result<LockToken> {
        let owner = owner.into();
        let requested_at = Instant::now();
        let lock_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.inner.expire_overdue();

        let mut granted = {
            let mut state = self.inner.state.lock();
            if state.holder.is_none() && state.queue.is_empty() {
                let token = state.grant(lock_id, owner, Duration::ZERO);
                drop(state);
                debug!(lock_id, owner = %token.owner, "lock acquired");
                spawn_watchdog(&self.inner, &token);
                return Ok(token);
            }
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(Waiter {
                lock_id,
                owner: owner.clone(),
                enqueued_at: requested_at,
                grant: tx,
            });
            debug!(lock_id, owner = %owner, queued = state.queue.len(), "lock busy, waiting");
            rx
        };

        match timeout(self.inner.config.wait_timeout, &mut granted).await {
            Ok(Ok(token)) => {
                debug!(lock_id, owner = %token.owner, "lock handed off");
                spawn_watchdog(&self.inner, &token);
                Ok(token)
            }
            Ok(Err(_)) | Err(_) => {
                let still_queued = {
                    let mut state = self.inner.state.lock();
                    let before = state.queue.len();
                    state.queue.retain(|w| w.lock_id != lock_id);
                    let removed = state.queue.len() != before;
                    if removed {
                        state.timeouts += 1;
                    }
                    removed
                };
                // Granted concurrently with the timeout firing.
                if !still_queued {
                    if let Ok(token) = granted.try_recv() {
                        spawn_watchdog(&self.inner, &token);
                        return Ok(token);
                    }
                }
                let waited = requested_at.elapsed();
                warn!(lock_id, owner = %owner, waited_ms = waited.as_millis() as u64, "lock wait timed out");
                Err(Error::LockTimeout { owner, waited })
            }
        }
    }

    /// Release the lock held under `lock_id`
    ///
    /// Returns false, changing nothing, if `lock_id` is not the current holder.
    pub fn release_lock(&self, lock_id: u64) -> bool {
        let next = {
            let mut state = self.inner.state.lock();
            match &state.holder {
                Some(holder) if holder.lock_id == lock_id => {}
                _ => {
                    debug!(lock_id, "release with stale or foreign token ignored");
                    return false;
                }
            }
            state.releases += 1;
            state.hand_off()
        };
        debug!(lock_id, next = ?next.as_ref().map(|t| t.lock_id), "lock released");
        if let Some(token) = next {
            spawn_watchdog(&self.inner, &token);
        }
        true
    }

    /// Run `f` while holding the lock, releasing it afterwards
    pub async fn with_lock<F, Fut, T>(&self, owner: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.acquire_lock(owner).await?;
        let out = f().await;
        self.release_lock(token.lock_id);
        Ok(out)
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.inner.state.lock().holder.is_some()
    }

    /// Current holder, if any
    pub fn current_holder(&self) -> Option<HeldLock> {
        self.inner.state.lock().holder.as_ref().map(|h| HeldLock {
            lock_id: h.lock_id,
            owner: h.owner.clone(),
            held_ms: h.acquired_at.elapsed().as_millis() as u64,
        })
    }

    /// Number of queued waiters
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Snapshot of lock activity
    pub fn stats(&self) -> LockStats {
        let state = self.inner.state.lock();
        let average_wait_time_ms = if state.acquisitions == 0 {
            0.0
        } else {
            state.total_wait.as_secs_f64() * 1_000.0 / state.acquisitions as f64
        };
        LockStats {
            total_acquisitions: state.acquisitions,
            total_releases: state.releases,
            total_timeouts: state.timeouts,
            forced_releases: state.forced,
            average_wait_time_ms,
            queue_length: state.queue.len(),
            is_locked: state.holder.is_some(),
            current_lock: state.holder.as_ref().map(|h| HeldLock {
                lock_id: h.lock_id,
                owner: h.owner.clone(),
                held_ms: h.acquired_at.elapsed().as_millis() as u64,
            }),
            queue: state
                .queue
                .iter()
                .map(|w| QueuedLock {
                    lock_id: w.lock_id,
                    owner: w.owner.clone(),
                    waiting_ms: w.enqueued_at.elapsed().as_millis() as u64,
                })
                .collect(),
        }
    }
}
