use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::report::PerformanceReport;
use crate::AppState;

// ─── GET /api/monitoring/performance ─────────────────────────────
/// Returns a single JSON report for curl or dashboards.

pub async fn get_report(State(state): State<Arc<AppState>>) -> Json<PerformanceReport> {
    Json(state.monitor.report())
}

// ─── DELETE /api/monitoring/performance ──────────────────────────
/// Drops all samples and aggregates. Intended for test/admin resets.

pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> StatusCode {
    state.monitor.clear();
    tracing::info!("performance metrics cleared");
    StatusCode::NO_CONTENT
}

// ─── GET /api/monitoring/stream ──────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a full `PerformanceReport` as JSON every stream interval.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.config.monitoring.stream_interval());

    let stream = IntervalStream::new(interval).map(move |_| {
        let report = state.monitor.report();
        let json = serde_json::to_string(&report).unwrap_or_default();
        Ok(Event::default().event("report").data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
