use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use learnhub_edge::cache::RemoteCache;
use learnhub_edge::config::loader;
use learnhub_edge::metrics::AggregationTask;
use learnhub_edge::redis_client::RedisCache;
use learnhub_edge::repository::{InMemoryScenarioRepository, ScenarioRepository};
use learnhub_edge::{mock_data, observability, server, AppState};

/// Simulated repository round-trip so cache hits are visible in metrics.
const REPOSITORY_LATENCY: Duration = Duration::from_millis(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Config + logging ──────────────────────────────────────
    let config_path = std::env::args().nth(1);
    let config = loader::load_config(config_path.as_deref())
        .map_err(anyhow::Error::msg)
        .context("loading configuration")?;
    observability::init_tracing(&config.logging.level);

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   LEARNHUB EDGE · cache + performance telemetry  ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 2. Distributed cache tier (optional, fail soft) ──────────
    let remote: Option<Arc<dyn RemoteCache>> = match &config.cache.redis_url {
        Some(url) => match RedisCache::connect(url, &config.cache.key_prefix).await {
            Ok(redis) => {
                tracing::info!(url = %url, "connected to redis");
                Some(Arc::new(redis))
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "redis unavailable; running with local cache only");
                None
            }
        },
        None => {
            tracing::info!("no redis_url configured; running with local cache only");
            None
        }
    };

    // ── 3. Seed scenario content ─────────────────────────────────
    let repo = Arc::new(InMemoryScenarioRepository::new(REPOSITORY_LATENCY));
    mock_data::seed(&repo);
    let scenarios: Arc<dyn ScenarioRepository> = repo;

    // ── 4. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState::new(config.clone(), remote, scenarios));

    // ── 5. Periodic aggregation ──────────────────────────────────
    let mut aggregation = if config.periodic_aggregation_allowed() {
        Some(AggregationTask::start(state.monitor.clone()))
    } else {
        tracing::info!("periodic aggregation disabled for this environment");
        None
    };

    // ── 6. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(addr = %addr, "listening");
    tracing::info!("performance report → /api/monitoring/performance");
    tracing::info!("report stream      → /api/monitoring/stream");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server exited with error")?;

    if let Some(task) = aggregation.as_mut() {
        task.stop();
    }
    Ok(())
}
