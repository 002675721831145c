//! Per-customer mutual exclusion around render + sync.
//!
//! Requests for the same customer share one working directory in the
//! version-control workspace, so they run one at a time. Different customers
//! never contend. Locks are created on demand and dropped from the arena once
//! no request holds or awaits them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct CustomerLocks {
    arena: Mutex<HashMap<String, Weak<TokioMutex<()>>>>,
}

/// Held for the duration of one customer's pipeline run.
pub struct CustomerGuard {
    customer_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl CustomerGuard {
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `customer_id`.
    pub async fn acquire(&self, customer_id: &str) -> CustomerGuard {
        let lock = self.lock_for(customer_id);
        if lock.try_lock().is_err() {
            tracing::debug!(customer = customer_id, "Waiting for in-flight run of customer");
        }
        CustomerGuard {
            customer_id: customer_id.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of customers with a live lock.
    pub fn active(&self) -> usize {
        match self.arena.lock() {
            Ok(arena) => arena.values().filter(|w| w.strong_count() > 0).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .filter(|w| w.strong_count() > 0)
                .count(),
        }
    }

    fn lock_for(&self, customer_id: &str) -> Arc<TokioMutex<()>> {
        // The arena only holds Weak handles, so a poisoned map is still consistent.
        let mut arena = self
            .arena
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        arena.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = arena.get(customer_id).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(TokioMutex::new(()));
        arena.insert(customer_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}
