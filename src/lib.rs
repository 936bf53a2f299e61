pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod mock_data;
pub mod observability;
pub mod redis_client;
pub mod repository;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheFacade, RemoteCache};
use crate::config::AppConfig;
use crate::metrics::PerformanceMonitor;
use crate::middleware::ResponseCache;
use crate::repository::ScenarioRepository;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    pub config: AppConfig,

    /// Central metrics engine. The wrapper pushes samples and reports read them.
    pub monitor: Arc<PerformanceMonitor>,

    /// Cache + metrics wrapper used by cached routes.
    pub responses: ResponseCache,

    /// Scenario content source.
    pub scenarios: Arc<dyn ScenarioRepository>,
}

impl AppState {
    /// Wire the cache, monitor, and wrapper from config.
    /// `remote` is the distributed tier, if one could be reached.
    pub fn new(
        config: AppConfig,
        remote: Option<Arc<dyn RemoteCache>>,
        scenarios: Arc<dyn ScenarioRepository>,
    ) -> Self {
        let mut cache = match remote {
            Some(remote) => CacheFacade::with_remote(remote),
            None => CacheFacade::new_local(),
        }
        .with_local_capacity(config.cache.max_local_entries);
        if config.cache.coalesce_misses {
            cache = cache.with_miss_coalescing();
        }

        let monitor = Arc::new(PerformanceMonitor::from_config(&config.monitoring));
        let responses = ResponseCache::new(
            cache,
            monitor.clone(),
            Duration::from_secs(config.cache.default_ttl_secs),
        );

        Self {
            config,
            monitor,
            responses,
            scenarios,
        }
    }
}
