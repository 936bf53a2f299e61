use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath},
    http::{header, request::Parts, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheFacade, RevalidateOptions};
use crate::error::AppError;
use crate::metrics::collector::SampleSink;
use crate::metrics::{HttpMethod, MetricSample};

pub const X_CACHE: &str = "x-cache";
pub const USER_ID_HEADER: &str = "x-user-id";

// ─── Request metadata ────────────────────────────────────────────

/// What the wrapper needs to know about the inbound request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub path: String,
    /// Raw query string, verbatim.
    pub query: Option<String>,
    /// Matched route template, e.g. "/api/scenarios/:id".
    pub route: Option<String>,
    pub user_id: Option<String>,
}

impl RequestMeta {
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            route: None,
            user_id: None,
        }
    }

    /// `"api:{path}:{query}"`. Parameter order is significant.
    pub fn cache_key(&self) -> String {
        format!("api:{}:{}", self.path, self.query.as_deref().unwrap_or(""))
    }

    fn endpoint(&self) -> &str {
        self.route.as_deref().unwrap_or(&self.path)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut meta = Self::new(parts.method.clone(), &parts.uri);
        meta.route = parts
            .extensions
            .get::<MatchedPath>()
            .map(|m| m.as_str().to_owned());
        meta.user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned);
        Ok(meta)
    }
}

// ─── Options ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedRequestOptions {
    /// Falls back to the configured default TTL.
    pub ttl_seconds: Option<u64>,
    /// Switches the wrapper into stale-while-revalidate mode.
    pub stale_while_revalidate_seconds: Option<u64>,
    pub use_distributed_cache: bool,
}

impl Default for CachedRequestOptions {
    fn default() -> Self {
        Self {
            ttl_seconds: None,
            stale_while_revalidate_seconds: None,
            use_distributed_cache: true,
        }
    }
}

impl CachedRequestOptions {
    pub fn ttl(mut self, secs: u64) -> Self {
        self.ttl_seconds = Some(secs);
        self
    }

    pub fn stale_while_revalidate(mut self, secs: u64) -> Self {
        self.stale_while_revalidate_seconds = Some(secs);
        self
    }

    pub fn local_only(mut self) -> Self {
        self.use_distributed_cache = false;
        self
    }
}

// ─── Wrapper ─────────────────────────────────────────────────────

/// Cache outcome reported in the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheTag {
    Hit,
    Miss,
    Swr,
}

impl CacheTag {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Swr => "SWR",
        }
    }

    fn counts_as_hit(self) -> bool {
        matches!(self, Self::Hit | Self::Swr)
    }
}

/// Wraps route handlers in cache lookup, JSON response building and
/// per-request metric recording.
#[derive(Clone)]
pub struct ResponseCache {
    cache: CacheFacade,
    sink: Arc<dyn SampleSink>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(cache: CacheFacade, sink: Arc<dyn SampleSink>, default_ttl: Duration) -> Self {
        Self {
            cache,
            sink,
            default_ttl,
        }
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    /// Serve `handler`'s JSON payload through the cache.
    ///
    /// Plain mode converts handler failures into a 500 `{ "error" }` body.
    /// SWR mode returns a failure on the synchronous compute path as `Err`.
    pub async fn cached_request<F, Fut>(
        &self,
        meta: &RequestMeta,
        handler: F,
        options: CachedRequestOptions,
    ) -> Result<Response, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        let started = Instant::now();
        let key = meta.cache_key();
        let ttl = options
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        let cache = if options.use_distributed_cache {
            self.cache.clone()
        } else {
            self.cache.local_only()
        };

        if let Some(swr_secs) = options.stale_while_revalidate_seconds {
            let opts = RevalidateOptions::new(ttl, Duration::from_secs(swr_secs));
            return match cache.get_with_revalidation(&key, handler, opts).await {
                Ok(payload) => {
                    let cache_control = format!(
                        "public, max-age={}, stale-while-revalidate={swr_secs}",
                        ttl.as_secs()
                    );
                    let resp = json_response(StatusCode::OK, payload, CacheTag::Swr, Some(cache_control));
                    self.observe(meta, started, CacheTag::Swr, StatusCode::OK, None);
                    Ok(resp)
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "[cached-request] revalidating handler failed");
                    self.observe(meta, started, CacheTag::Miss, e.status(), Some(e.to_string()));
                    Err(e)
                }
            };
        }

        match cache.get_or_insert_with(&key, ttl, handler).await {
            Ok((payload, hit)) => {
                let tag = if hit { CacheTag::Hit } else { CacheTag::Miss };
                let cache_control = format!("public, max-age={}", ttl.as_secs());
                let resp = json_response(
                    StatusCode::OK,
                    with_cache_flag(payload, hit),
                    tag,
                    Some(cache_control),
                );
                self.observe(meta, started, tag, StatusCode::OK, None);
                Ok(resp)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(key = %key, error = %message, "[cached-request] handler failed");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let resp = json_response(status, json!({ "error": message }), CacheTag::Miss, None);
                self.observe(meta, started, CacheTag::Miss, status, Some(message));
                Ok(resp)
            }
        }
    }

    fn observe(
        &self,
        meta: &RequestMeta,
        started: Instant,
        tag: CacheTag,
        status: StatusCode,
        error_message: Option<String>,
    ) {
        self.sink.record(MetricSample {
            endpoint: meta.endpoint().to_owned(),
            method: HttpMethod::from(&meta.method),
            duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
            cache_hit: tag.counts_as_hit(),
            status_code: status.as_u16(),
            timestamp: Utc::now(),
            user_id: meta.user_id.clone(),
            error_message,
        });
    }
}

/// Merge `cacheHit` into object payloads; wrap anything else as `data`.
pub fn with_cache_flag(payload: Value, hit: bool) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("cacheHit".into(), Value::Bool(hit));
            Value::Object(map)
        }
        other => json!({ "data": other, "cacheHit": hit }),
    }
}

fn json_response(
    status: StatusCode,
    body: Value,
    tag: CacheTag,
    cache_control: Option<String>,
) -> Response {
    let mut resp = (status, Json(body)).into_response();
    let headers = resp.headers_mut();
    headers.insert(X_CACHE, HeaderValue::from_static(tag.as_str()));
    if let Some(cc) = cache_control.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(header::CACHE_CONTROL, cc);
    }
    resp
}
