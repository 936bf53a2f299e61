use axum::{
    middleware as axum_mw,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Scenario catalogue (cached) ─────────────────────────
        .route("/api/scenarios", get(handlers::scenarios::list_scenarios))
        .route("/api/scenarios/:id", get(handlers::scenarios::get_scenario))
        .route(
            "/api/scenarios/:id/summary",
            get(handlers::scenarios::scenario_summary),
        )
        // ── Health ──────────────────────────────────────────────
        .route("/api/health", get(handlers::health::health))
        // ── Monitoring ──────────────────────────────────────────
        .route(
            "/api/monitoring/performance",
            get(stream::get_report).delete(stream::reset_metrics),
        )
        .route("/api/monitoring/stream", get(stream::metrics_stream))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
