//! Named lock registry
//!
//! Resource types whose instances all write into one backend configuration
//! object take the lock named after the type around every mutation. The
//! registry only serialises callers inside this process.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Guard held for the duration of a mutation; dropping it releases the lock
pub type ResourceGuard = OwnedMutexGuard<()>;

/// Concurrent map from lock name to mutex
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock named `name`, creating it on first use
    pub async fn lock(&self, name: &str) -> ResourceGuard {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        trace!("Waiting for resource lock {}", name);
        let guard = mutex.lock_owned().await;
        trace!("Acquired resource lock {}", name);
        guard
    }

    /// Number of distinct lock names handed out so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
