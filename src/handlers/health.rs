use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::metrics::report::{cache_degraded_alert, Alert};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub cache: CacheStats,
    pub buffered_samples: usize,
    pub alerts: Vec<Alert>,
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let cache = state.responses.cache().stats();

    let mut alerts = Vec::new();
    if cache.redis_connected == Some(false) {
        alerts.push(cache_degraded_alert());
    }

    Json(HealthStatus {
        status: if alerts.is_empty() { "ok" } else { "degraded" },
        cache,
        buffered_samples: state.monitor.sample_count(),
        alerts,
    })
}
