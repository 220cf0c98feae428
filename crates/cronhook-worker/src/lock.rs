//! Run-once job locks held in the shared key-value store.
//!
//! A lock is the key `job:<name>` holding `"true"` with a TTL. The TTL is
//! the only thing that frees a lock whose holder died mid-run.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use cronhook_cache::keys;
use cronhook_core::traits::cache::CacheProvider;

/// Value stored under a held lock key.
pub const ACTIVE: &str = "true";

/// Named job locks over a [`CacheProvider`].
///
/// When disabled every job reads as unlocked and acquire/release do
/// nothing, so development dispatches never skip jobs.
///
/// Store failures are logged and otherwise ignored: a failed read counts
/// as unlocked, which favours running a job twice over not running it.
#[derive(Debug, Clone)]
pub struct JobLock {
    store: Arc<dyn CacheProvider>,
    enabled: bool,
}

impl JobLock {
    /// Create a lock manager over `store`.
    pub fn new(store: Arc<dyn CacheProvider>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Whether locks are enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether another run of `name` currently holds the lock.
    pub async fn is_locked(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }

        match self.store.get(&keys::job_lock(name)).await {
            Ok(value) => value.as_deref() == Some(ACTIVE),
            Err(e) => {
                warn!(job = name, error = %e, "Lock read failed, treating job as unlocked");
                false
            }
        }
    }

    /// Take the lock for `name`; it expires on its own after `ttl`.
    pub async fn acquire(&self, name: &str, ttl: Duration) {
        if !self.enabled {
            return;
        }

        match self.store.set(&keys::job_lock(name), ACTIVE, ttl).await {
            Ok(()) => debug!(job = name, ttl_secs = ttl.as_secs(), "Lock acquired"),
            Err(e) => warn!(job = name, error = %e, "Failed to acquire lock"),
        }
    }

    /// Drop the lock for `name`.
    pub async fn release(&self, name: &str) {
        if !self.enabled {
            return;
        }

        match self.store.delete(&keys::job_lock(name)).await {
            Ok(()) => debug!(job = name, "Lock released"),
            Err(e) => warn!(job = name, error = %e, "Failed to release lock"),
        }
    }
}
