use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tower-compatible middleware that adds three response headers:
///
///   X-Request-Id        — echoed from the request, or a fresh UUID
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
///
/// Also emits one structured log line per `/api/` request.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    let headers = response.headers_mut();
    if let Ok(val) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, val);
    }
    if let Ok(val) = us.to_string().parse() {
        headers.insert("x-response-time-us", val);
    }
    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        headers.insert("server-timing", val);
    }

    // Skip the SSE stream; it stays open for minutes
    let status = response.status().as_u16();
    if path.starts_with("/api/") && !path.ends_with("/stream") {
        let cache = response
            .headers()
            .get("x-cache")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_owned();
        if status >= 500 {
            tracing::warn!(%method, %path, status, elapsed_us = us as u64, %cache, request_id = %request_id, "request failed");
        } else {
            tracing::info!(%method, %path, status, elapsed_us = us as u64, %cache, request_id = %request_id, "request");
        }
    }

    response
}
