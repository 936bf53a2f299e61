use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use learnhub_edge::cache::{RemoteCache, StoredEntry};
use learnhub_edge::config::AppConfig;
use learnhub_edge::error::CacheError;
use learnhub_edge::repository::{InMemoryScenarioRepository, ScenarioRepository};
use learnhub_edge::{mock_data, server, AppState};

/// Remote tier that is always down.
struct FailingRemote;

#[async_trait]
impl RemoteCache for FailingRemote {
    async fn get(&self, _key: &str) -> Result<Option<StoredEntry>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn set(&self, _key: &str, _entry: &StoredEntry) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    fn is_connected(&self) -> bool {
        false
    }
}

fn state(remote: Option<Arc<dyn RemoteCache>>) -> Arc<AppState> {
    let config = AppConfig {
        environment: "test".into(),
        ..AppConfig::default()
    };
    let repo = Arc::new(InMemoryScenarioRepository::new(Duration::ZERO));
    mock_data::seed(&repo);
    let scenarios: Arc<dyn ScenarioRepository> = repo;
    Arc::new(AppState::new(config, remote, scenarios))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Option<String>, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "learner-1")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let x_cache = resp
        .headers()
        .get("x-cache")
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, x_cache, json)
}

#[tokio::test]
async fn scenario_listing_is_cached() {
    let app = server::create_router(state(None));

    let (status, x_cache, body) = send(&app, Method::GET, "/api/scenarios?language=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("MISS"));
    assert_eq!(body["cacheHit"], false);
    assert!(body["total"].as_u64().unwrap() > 0);

    let (_, x_cache, body) = send(&app, Method::GET, "/api/scenarios?language=en").await;
    assert_eq!(x_cache.as_deref(), Some("HIT"));
    assert_eq!(body["cacheHit"], true);
}

#[tokio::test]
async fn scenario_detail_and_unknown_id() {
    let app = server::create_router(state(None));

    let (status, _, body) = send(&app, Method::GET, "/api/scenarios/scn_001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "scn_001");

    let (status, x_cache, body) = send(&app, Method::GET, "/api/scenarios/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(x_cache.is_none());
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn summary_uses_stale_while_revalidate() {
    let app = server::create_router(state(None));

    let (status, x_cache, body) = send(&app, Method::GET, "/api/scenarios/scn_002/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("SWR"));
    assert_eq!(body["id"], "scn_002");
    assert!(body.get("cacheHit").is_none());
}

#[tokio::test]
async fn report_groups_by_route_template() {
    let st = state(None);
    let app = server::create_router(st.clone());

    send(&app, Method::GET, "/api/scenarios/scn_001").await;
    send(&app, Method::GET, "/api/scenarios/scn_002").await;
    send(&app, Method::GET, "/api/scenarios/scn_001").await;
    st.monitor.aggregate();

    let (status, _, report) = send(&app, Method::GET, "/api/monitoring/performance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["summary"]["totalRequests"], 3);

    let endpoints = report["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0]["endpoint"], "/api/scenarios/:id");
    assert_eq!(endpoints[0]["totalRequests"], 3);

    let recent = st.monitor.recent(1);
    assert_eq!(recent[0].user_id.as_deref(), Some("learner-1"));
}

#[tokio::test]
async fn reset_clears_samples_and_aggregates() {
    let st = state(None);
    let app = server::create_router(st.clone());

    send(&app, Method::GET, "/api/scenarios").await;
    st.monitor.aggregate();
    assert_eq!(st.monitor.aggregated().len(), 1);

    let (status, _, _) = send(&app, Method::DELETE, "/api/monitoring/performance").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(st.monitor.sample_count(), 0);
    assert!(st.monitor.aggregated().is_empty());
}

#[tokio::test]
async fn health_reports_local_mode() {
    let app = server::create_router(state(None));
    let (status, _, body) = send(&app, Method::GET, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["cache"]["redisConnected"].is_null());
}

#[tokio::test]
async fn unreachable_redis_degrades_to_local_cache() {
    let app = server::create_router(state(Some(Arc::new(FailingRemote))));

    let (status, x_cache, _) = send(&app, Method::GET, "/api/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("MISS"));

    let (status, x_cache, _) = send(&app, Method::GET, "/api/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("HIT"));

    let (_, _, health) = send(&app, Method::GET, "/api/health").await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["cache"]["redisConnected"], false);
    assert_eq!(health["alerts"][0]["kind"], "cacheDegraded");
}

#[tokio::test]
async fn timing_headers_are_attached() {
    let app = server::create_router(state(None));
    let req = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-123");
    assert!(resp.headers().contains_key("x-response-time-us"));
    assert!(resp.headers().contains_key("server-timing"));
}
