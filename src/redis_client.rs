use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{RemoteCache, StoredEntry};
use crate::error::CacheError;

/// Redis-backed distributed tier.
///
/// `ConnectionManager` is cheaply cloneable and reconnects on its own; we
/// only remember whether the last round-trip worked so health checks can
/// report degraded mode.
pub struct RedisCache {
    conn: ConnectionManager,
    prefix: String,
    connected: AtomicBool,
}

impl RedisCache {
    /// Open a managed connection. Callers decide whether failure is fatal.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            connected: AtomicBool::new(true),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    fn observe<T>(&self, result: redis::RedisResult<T>) -> Result<T, CacheError> {
        match result {
            Ok(v) => {
                if !self.connected.swap(true, Ordering::Relaxed) {
                    tracing::info!("redis connection restored");
                }
                Ok(v)
            }
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                    self.connected.store(false, Ordering::Relaxed);
                }
                Err(CacheError::Redis(e))
            }
        }
    }
}

#[async_trait]
impl RemoteCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self.observe(conn.get(self.namespaced(key)).await)?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), CacheError> {
        let json = serde_json::to_string(entry)?;
        let ttl_ms = entry.physical_ttl().as_millis() as u64;

        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.namespaced(key)).arg(&json).arg("PX").arg(ttl_ms);
        let result: redis::RedisResult<()> = cmd.query_async(&mut conn).await;
        self.observe(result)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn.del(self.namespaced(key)).await;
        self.observe(result)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
