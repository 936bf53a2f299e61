pub mod aggregator;
pub mod collector;
pub mod percentiles;
pub mod report;
pub mod stream;

pub use aggregator::{AggregatedEndpointMetrics, AggregationTask};
pub use collector::{PerformanceMonitor, ValidatingRecorder};
pub use report::{Alert, AlertKind, PerformanceReport};

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// HTTP verb of a recorded request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Other(m) => m,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Get,
            Method::POST => Self::Post,
            Method::PUT => Self::Put,
            Method::PATCH => Self::Patch,
            Method::DELETE => Self::Delete,
            Method::HEAD => Self::Head,
            Method::OPTIONS => Self::Options,
            ref other => Self::Other(other.as_str().to_owned()),
        }
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One completed request. Accepted by the recorder exactly as given.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    /// Route identifier, e.g. "/api/scenarios"
    pub endpoint: String,
    pub method: HttpMethod,
    pub duration_ms: f64,
    pub cache_hit: bool,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MetricSample {
    /// Aggregation key: `"{METHOD}:{endpoint}"`.
    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.endpoint)
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

pub fn endpoint_key(method: &HttpMethod, endpoint: &str) -> String {
    format!("{method}:{endpoint}")
}
