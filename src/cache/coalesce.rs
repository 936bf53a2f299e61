use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async locks used to serialize concurrent misses for one key.
pub struct MissCoalescer {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MissCoalescer {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            // Locks nobody else holds or waits on can go.
            inflight.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    pub async fn tracked_keys(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl Default for MissCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
