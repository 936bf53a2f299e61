use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use super::coalesce::MissCoalescer;
use super::remote::{now_ms, RemoteCache, StoredEntry};

/// Default bound on live local entries.
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

fn deadline_after(start: Instant, ttl: Duration) -> Instant {
    start
        .checked_add(ttl)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

// ─── Entry ───────────────────────────────────────────────────────

/// One locally cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Instant,
    /// End of the stale-while-revalidate window, if one was requested.
    pub stale_until: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Past `expires_at` but inside the SWR window.
    Stale,
    Expired,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration, stale_while_revalidate: Option<Duration>) -> Self {
        let expires_at = deadline_after(Instant::now(), ttl);
        Self {
            value,
            expires_at,
            stale_until: stale_while_revalidate.map(|swr| deadline_after(expires_at, swr)),
        }
    }

    pub fn freshness_at(&self, now: Instant) -> Freshness {
        if now < self.expires_at {
            Freshness::Fresh
        } else if self.stale_until.is_some_and(|until| now <= until) {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Instant::now())
    }

    /// Rebase a wall-clock remote envelope onto the local monotonic clock.
    fn from_stored(stored: StoredEntry) -> Self {
        let now = Instant::now();
        let wall = now_ms();
        let rebase = |deadline_ms: i64| {
            let delta = deadline_ms - wall;
            if delta >= 0 {
                deadline_after(now, Duration::from_millis(delta as u64))
            } else {
                now.checked_sub(Duration::from_millis(delta.unsigned_abs()))
                    .unwrap_or(now)
            }
        };
        Self {
            expires_at: rebase(stored.expires_at_ms),
            stale_until: stored.stale_until_ms.map(rebase),
            value: stored.value,
        }
    }
}

// ─── Options / stats ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidateOptions {
    pub ttl: Duration,
    pub stale_while_revalidate: Duration,
}

impl RevalidateOptions {
    pub fn new(ttl: Duration, stale_while_revalidate: Duration) -> Self {
        Self {
            ttl,
            stale_while_revalidate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub local_cache_size: usize,
    /// `None` when no distributed tier is configured.
    pub redis_connected: Option<bool>,
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub background_refreshes: u64,
    pub refresh_failures: u64,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    background_refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

enum Lookup {
    Fresh(Value),
    Stale(Value),
    Miss,
}

// ─── Facade ──────────────────────────────────────────────────────

/// Key-value cache with TTL and optional stale-while-revalidate.
///
/// Cheap to clone; clones share the same local map, remote tier, and
/// counters. Concurrent misses for one key each compute and the last
/// write wins, unless miss coalescing is switched on.
#[derive(Clone)]
pub struct CacheFacade {
    local: Arc<RwLock<HashMap<String, CacheEntry>>>,
    remote: Option<Arc<dyn RemoteCache>>,
    coalescer: Option<Arc<MissCoalescer>>,
    counters: Arc<CacheCounters>,
    max_local_entries: usize,
}

impl CacheFacade {
    pub fn new_local() -> Self {
        Self {
            local: Arc::new(RwLock::new(HashMap::new())),
            remote: None,
            coalescer: None,
            counters: Arc::new(CacheCounters::default()),
            max_local_entries: DEFAULT_LOCAL_CAPACITY,
        }
    }

    pub fn with_remote(remote: Arc<dyn RemoteCache>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new_local()
        }
    }

    /// Serialize concurrent misses per key and re-check before computing.
    pub fn with_miss_coalescing(mut self) -> Self {
        self.coalescer = Some(Arc::new(MissCoalescer::new()));
        self
    }

    /// Bound the local tier. At capacity, expired entries are swept first,
    /// then the entry closest to expiry is evicted.
    pub fn with_local_capacity(mut self, max_entries: usize) -> Self {
        self.max_local_entries = max_entries.max(1);
        self
    }

    /// Same local map and counters, remote tier detached.
    pub fn local_only(&self) -> Self {
        Self {
            remote: None,
            ..self.clone()
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    // ── Plain accessors ─────────────────────────────────────────

    /// Fresh value or `None`. Entries inside an SWR window read as misses.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.lookup(key).await {
            Lookup::Fresh(v) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            Lookup::Stale(_) | Lookup::Miss => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.write(key, value, ttl, None).await;
    }

    pub async fn set_with_swr(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        stale_while_revalidate: Duration,
    ) {
        self.write(key, value, ttl, Some(stale_while_revalidate)).await;
    }

    pub async fn delete(&self, key: &str) {
        self.local.write().remove(key);
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(key).await {
                tracing::warn!(key = %key, error = %e, "remote cache DELETE failed");
            }
        }
    }

    /// Fresh hit, or run `compute`, store the result, and return it.
    /// The flag is `true` on a hit. `compute` errors propagate untouched
    /// and nothing is stored.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<(Value, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(v) = self.get(key).await {
            return Ok((v, true));
        }

        let _guard = match &self.coalescer {
            Some(c) => {
                let guard = c.acquire(key).await;
                if let Lookup::Fresh(v) = self.lookup(key).await {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok((v, true));
                }
                Some(guard)
            }
            None => None,
        };

        let value = compute().await?;
        self.set(key, value.clone(), ttl).await;
        Ok((value, false))
    }

    // ── Stale-while-revalidate ──────────────────────────────────

    /// SWR-aware read.
    ///
    /// - fresh: cached value, no recompute
    /// - stale, inside the window: cached value now, refresh in a detached
    ///   task whose failure is logged and dropped
    /// - missing or past the window: `compute` inline; its error propagates
    pub async fn get_with_revalidation<F, Fut, E>(
        &self,
        key: &str,
        compute: F,
        opts: RevalidateOptions,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match self.lookup(key).await {
            Lookup::Fresh(v) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(v)
            }
            Lookup::Stale(v) => {
                self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                self.spawn_refresh(key.to_string(), compute, opts);
                Ok(v)
            }
            Lookup::Miss => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                let _guard = match &self.coalescer {
                    Some(c) => {
                        let guard = c.acquire(key).await;
                        match self.lookup(key).await {
                            Lookup::Fresh(v) | Lookup::Stale(v) => return Ok(v),
                            Lookup::Miss => Some(guard),
                        }
                    }
                    None => None,
                };
                let value = compute().await?;
                self.write(key, value.clone(), opts.ttl, Some(opts.stale_while_revalidate))
                    .await;
                Ok(value)
            }
        }
    }

    fn spawn_refresh<F, Fut, E>(&self, key: String, compute: F, opts: RevalidateOptions)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let cache = self.clone();
        cache
            .counters
            .background_refreshes
            .fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            match compute().await {
                Ok(value) => {
                    cache
                        .write(&key, value, opts.ttl, Some(opts.stale_while_revalidate))
                        .await;
                    tracing::debug!(key = %key, "background revalidation stored fresh value");
                }
                Err(e) => {
                    cache.counters.refresh_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "background revalidation failed; keeping stale entry");
                }
            }
        });
    }

    // ── Introspection ───────────────────────────────────────────

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_cache_size: self.local.read().len(),
            redis_connected: self.remote.as_ref().map(|r| r.is_connected()),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            background_refreshes: self.counters.background_refreshes.load(Ordering::Relaxed),
            refresh_failures: self.counters.refresh_failures.load(Ordering::Relaxed),
        }
    }

    /// Drop every local entry that is past its stale window. Returns how
    /// many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.local.write();
        let before = map.len();
        map.retain(|_, e| e.freshness_at(now) != Freshness::Expired);
        before - map.len()
    }

    // ── Internals ───────────────────────────────────────────────

    async fn lookup(&self, key: &str) -> Lookup {
        let local = self.local.read().get(key).cloned();
        if let Some(entry) = local {
            match entry.freshness() {
                Freshness::Fresh => return Lookup::Fresh(entry.value),
                Freshness::Stale => return Lookup::Stale(entry.value),
                Freshness::Expired => {
                    self.remove_if_expired(key);
                }
            }
        }

        let Some(remote) = &self.remote else {
            return Lookup::Miss;
        };

        match remote.get(key).await {
            Ok(Some(stored)) => {
                let entry = CacheEntry::from_stored(stored);
                let freshness = entry.freshness();
                if freshness == Freshness::Expired {
                    return Lookup::Miss;
                }
                tracing::debug!(key = %key, "cache hit (remote), promoting to local");
                let value = entry.value.clone();
                self.insert_local(key, entry);
                match freshness {
                    Freshness::Fresh => Lookup::Fresh(value),
                    _ => Lookup::Stale(value),
                }
            }
            Ok(None) => Lookup::Miss,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "remote cache GET failed; treating as miss");
                Lookup::Miss
            }
        }
    }

    async fn write(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        stale_while_revalidate: Option<Duration>,
    ) {
        let stored = self
            .remote
            .as_ref()
            .map(|_| StoredEntry::new(value.clone(), ttl, stale_while_revalidate));

        self.insert_local(key, CacheEntry::new(value, ttl, stale_while_revalidate));

        if let (Some(remote), Some(stored)) = (&self.remote, stored) {
            if let Err(e) = remote.set(key, &stored).await {
                tracing::warn!(key = %key, error = %e, "remote cache SET failed; entry kept locally");
            }
        }
    }

    /// A concurrent write may have replaced the entry since it was read.
    fn remove_if_expired(&self, key: &str) -> bool {
        let mut map = self.local.write();
        let expired = map
            .get(key)
            .is_some_and(|e| e.freshness() == Freshness::Expired);
        if expired {
            map.remove(key);
        }
        expired
    }

    fn insert_local(&self, key: &str, entry: CacheEntry) {
        let mut map = self.local.write();
        if !map.contains_key(key) && map.len() >= self.max_local_entries {
            let now = Instant::now();
            map.retain(|_, e| e.freshness_at(now) != Freshness::Expired);
            while map.len() >= self.max_local_entries {
                let Some(victim) = map
                    .iter()
                    .min_by_key(|(_, e)| e.stale_until.unwrap_or(e.expires_at))
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                map.remove(&victim);
            }
        }
        map.insert(key.to_string(), entry);
    }
}

impl Default for CacheFacade {
    fn default() -> Self {
        Self::new_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// In-process stand-in for a shared remote tier.
    #[derive(Default)]
    struct MapRemote {
        entries: parking_lot::Mutex<HashMap<String, StoredEntry>>,
    }

    #[async_trait]
    impl RemoteCache for MapRemote {
        async fn get(&self, key: &str) -> Result<Option<StoredEntry>, CacheError> {
            Ok(self.entries.lock().get(key).cloned())
        }
        async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), CacheError> {
            self.entries.lock().insert(key.into(), entry.clone());
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.entries.lock().remove(key);
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
    }

    struct DownRemote {
        connected: AtomicBool,
    }

    #[async_trait]
    impl RemoteCache for DownRemote {
        async fn get(&self, _key: &str) -> Result<Option<StoredEntry>, CacheError> {
            self.connected.store(false, Ordering::Relaxed);
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _entry: &StoredEntry) -> Result<(), CacheError> {
            self.connected.store(false, Ordering::Relaxed);
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_fresh_until_ttl_then_missing() {
        let cache = CacheFacade::new_local();
        cache.set("k", json!("v1"), secs(1)).await;

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get("k").await, Some(json!("v1")));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().local_cache_size, 0);
    }

    #[test]
    fn freshness_boundaries() {
        let now = Instant::now();
        let entry = CacheEntry {
            value: Value::Null,
            expires_at: now + secs(1),
            stale_until: Some(now + secs(6)),
        };
        assert_eq!(entry.freshness_at(now), Freshness::Fresh);
        assert_eq!(entry.freshness_at(now + secs(1)), Freshness::Stale);
        assert_eq!(entry.freshness_at(now + secs(6)), Freshness::Stale);
        assert_eq!(
            entry.freshness_at(now + secs(6) + Duration::from_millis(1)),
            Freshness::Expired
        );

        let plain = CacheEntry {
            stale_until: None,
            ..entry
        };
        assert_eq!(plain.freshness_at(now + secs(1)), Freshness::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn swr_serves_stale_and_refreshes_in_background() {
        let cache = CacheFacade::new_local();
        let opts = RevalidateOptions::new(secs(1), secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let compute = |calls: Arc<AtomicUsize>, v: &'static str| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(json!(v))
            }
        };

        let v = cache
            .get_with_revalidation("k", compute(calls.clone(), "v1"), opts)
            .await
            .unwrap();
        assert_eq!(v, json!("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // t = 1.5s: stale, served immediately
        tokio::time::advance(Duration::from_millis(1_500)).await;
        let v = cache
            .get_with_revalidation("k", compute(calls.clone(), "v2"), opts)
            .await
            .unwrap();
        assert_eq!(v, json!("v1"));

        // t = 2s: background refresh has landed
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("k").await, Some(json!("v2")));

        // refreshed at t≈1.5s, so its window ends near t=7.5s; t = 8s is past it
        tokio::time::advance(Duration::from_millis(6_000)).await;
        let v = cache
            .get_with_revalidation("k", compute(calls.clone(), "v3"), opts)
            .await
            .unwrap();
        assert_eq!(v, json!("v3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().background_refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn miss_path_error_propagates_and_stores_nothing() {
        let cache = CacheFacade::new_local();
        let err = cache
            .get_with_revalidation(
                "k",
                || async { Err::<Value, _>("db down".to_string()) },
                RevalidateOptions::new(secs(1), secs(5)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, "db down");
        assert_eq!(cache.stats().local_cache_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_background_refresh_keeps_stale_entry() {
        let cache = CacheFacade::new_local();
        let opts = RevalidateOptions::new(secs(1), secs(5));
        cache.set_with_swr("k", json!("v1"), secs(1), secs(5)).await;

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let v = cache
            .get_with_revalidation("k", || async { Err::<Value, _>("boom") }, opts)
            .await
            .unwrap();
        assert_eq!(v, json!("v1"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = cache.stats();
        assert_eq!(stats.refresh_failures, 1);
        assert_eq!(stats.stale_hits, 1);

        // still served stale on the next read
        let v = cache
            .get_with_revalidation("k", || async { Err::<Value, _>("boom") }, opts)
            .await
            .unwrap();
        assert_eq!(v, json!("v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn plain_get_treats_stale_window_as_miss() {
        let cache = CacheFacade::new_local();
        cache.set_with_swr("k", json!(1), secs(1), secs(5)).await;
        tokio::time::advance(secs(2)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn remote_hit_is_promoted_to_local() {
        let remote = Arc::new(MapRemote::default());
        let writer = CacheFacade::with_remote(remote.clone());
        writer.set("shared", json!({"n": 1}), secs(60)).await;

        let reader = CacheFacade::with_remote(remote);
        assert_eq!(reader.stats().local_cache_size, 0);
        assert_eq!(reader.get("shared").await, Some(json!({"n": 1})));
        assert_eq!(reader.stats().local_cache_size, 1);
        assert_eq!(reader.stats().redis_connected, Some(true));
    }

    #[tokio::test]
    async fn unreachable_remote_fails_soft() {
        let remote = Arc::new(DownRemote {
            connected: AtomicBool::new(true),
        });
        let cache = CacheFacade::with_remote(remote);

        assert_eq!(cache.get("k").await, None);
        cache.set("k", json!("v"), secs(60)).await;
        assert_eq!(cache.get("k").await, Some(json!("v")));
        assert_eq!(cache.stats().redis_connected, Some(false));
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn local_only_view_skips_remote_but_shares_map() {
        let remote = Arc::new(MapRemote::default());
        let cache = CacheFacade::with_remote(remote.clone());
        let local = cache.local_only();

        local.set("k", json!(1), secs(60)).await;
        assert!(remote.entries.lock().is_empty());
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(local.stats().redis_connected, None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = CacheFacade::new_local();
        cache.set("short", json!(1), secs(1)).await;
        cache.set_with_swr("swr", json!(2), secs(1), secs(10)).await;
        cache.set("long", json!(3), secs(100)).await;

        tokio::time::advance(secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().local_cache_size, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_saturates_instead_of_panicking() {
        let cache = CacheFacade::new_local();
        cache.set("k", json!(1), Duration::from_secs(u64::MAX)).await;
        cache
            .set_with_swr("s", json!(2), Duration::MAX, Duration::MAX)
            .await;

        tokio::time::advance(secs(365 * 86_400)).await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(cache.get("s").await, Some(json!(2)));

        let v = cache
            .get_with_revalidation(
                "r",
                || async { Ok::<_, String>(json!(3)) },
                RevalidateOptions::new(Duration::MAX, Duration::MAX),
            )
            .await
            .unwrap();
        assert_eq!(v, json!(3));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cleanup_spares_a_rewritten_entry() {
        let cache = CacheFacade::new_local();
        cache.set("k", json!("old"), secs(1)).await;
        tokio::time::advance(secs(2)).await;

        // rewritten between the expired read and the cleanup
        cache.set("k", json!("new"), secs(60)).await;
        assert!(!cache.remove_if_expired("k"));
        assert_eq!(cache.get("k").await, Some(json!("new")));

        tokio::time::advance(secs(61)).await;
        assert!(cache.remove_if_expired("k"));
        assert_eq!(cache.stats().local_cache_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn local_tier_is_bounded() {
        let cache = CacheFacade::new_local().with_local_capacity(3);
        cache.set("a", json!(1), secs(10)).await;
        cache.set("b", json!(2), secs(30)).await;
        cache.set("c", json!(3), secs(20)).await;

        // "a" expires soonest and is evicted
        cache.set("d", json!(4), secs(40)).await;
        assert_eq!(cache.stats().local_cache_size, 3);
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(json!(2)));

        // overwriting an existing key never evicts
        cache.set("b", json!(5), secs(40)).await;
        assert_eq!(cache.get("c").await, Some(json!(3)));

        // expired entries go before live ones
        tokio::time::advance(secs(25)).await;
        cache.set("e", json!(6), secs(40)).await;
        assert_eq!(cache.stats().local_cache_size, 3);
        assert_eq!(cache.get("b").await, Some(json!(5)));
        assert_eq!(cache.get("d").await, Some(json!(4)));
    }

    #[tokio::test]
    async fn concurrent_misses_each_compute_by_default() {
        let cache = CacheFacade::new_local();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: CacheFacade, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_insert_with("k", secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>(json!("v"))
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), calls.clone()),
            run(cache.clone(), calls.clone())
        );
        assert_eq!(a.unwrap(), (json!("v"), false));
        assert_eq!(b.unwrap(), (json!("v"), false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn coalesced_misses_compute_once() {
        let cache = CacheFacade::new_local().with_miss_coalescing();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: CacheFacade, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_insert_with("k", secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>(json!("v"))
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), calls.clone()),
            run(cache.clone(), calls.clone())
        );
        let hits = [a.unwrap().1, b.unwrap().1];
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(hits.contains(&true) && hits.contains(&false));
    }
}
