//! Per-session ingest serialization
//!
//! Concurrent ingests of the same key queue on one lock; the first writes, the
//! rest find the session present and return.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of in-flight session ingests
#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive claim on one session key, released on drop
pub struct InFlightPermit<'a> {
    registry: &'a InFlight,
    key: String,
    _lock: OwnedMutexGuard<()>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other ingest of `session_key` is running, then claim it
    pub async fn acquire(&self, session_key: &str) -> InFlightPermit<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(session_key.to_string()).or_default())
        };
        let lock = slot.lock_owned().await;
        InFlightPermit {
            registry: self,
            key: session_key.to_string(),
            _lock: lock,
        }
    }

    /// Number of keys with a running or queued ingest
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        let mut slots = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Registry + this permit; anything more is a queued waiter
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2)
        {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let registry = Arc::new(InFlight::new());
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let (registry, active, peak) = (registry.clone(), active.clone(), peak.clone());
            handles.push(tokio::spawn(async move {
                let _permit = registry.acquire("9158").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let registry = InFlight::new();
        let _a = registry.acquire("9158").await;
        let _b = registry.acquire("7953").await;
        assert_eq!(registry.len(), 2);
    }
}
