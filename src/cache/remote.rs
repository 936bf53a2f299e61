use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::CacheError;

/// Distributed cache tier consumed by the facade.
///
/// Implementations report failures as errors; the facade decides how to
/// degrade.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError>;

    async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Last observed connectivity.
    fn is_connected(&self) -> bool;
}

/// Wire envelope for remote entries. Deadlines are wall-clock epoch
/// milliseconds so every instance reads the same freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub value: Value,
    pub expires_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_until_ms: Option<i64>,
}

impl StoredEntry {
    pub fn new(value: Value, ttl: Duration, stale_while_revalidate: Option<Duration>) -> Self {
        let now = now_ms();
        let expires_at_ms = now.saturating_add(millis(ttl));
        Self {
            value,
            expires_at_ms,
            stale_until_ms: stale_while_revalidate
                .map(|swr| expires_at_ms.saturating_add(millis(swr))),
        }
    }

    /// How long the backing store must keep the key: until the end of the
    /// stale window, or until expiry when there is none. At least 1 ms.
    pub fn physical_ttl(&self) -> Duration {
        let end = self.stale_until_ms.unwrap_or(self.expires_at_ms);
        Duration::from_millis(end.saturating_sub(now_ms()).max(1) as u64)
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
