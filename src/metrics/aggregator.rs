use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::collector::PerformanceMonitor;
use super::percentiles::percentile_by_index;
use super::{endpoint_key, report, HttpMethod, MetricSample};

/// Rolling statistics for one `(method, endpoint)` pair.
/// Rates are percentages in `0..=100`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEndpointMetrics {
    pub endpoint: String,
    pub method: HttpMethod,
    pub total_requests: u64,
    pub average_response_time: f64,
    pub p95_response_time: f64,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl AggregatedEndpointMetrics {
    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.endpoint)
    }
}

// ─── Fold ────────────────────────────────────────────────────────

/// Group window samples by endpoint key and compute one summary per group.
/// Groups are only produced for keys that have samples.
pub fn summarize<'a>(
    window: impl Iterator<Item = &'a MetricSample>,
    now: DateTime<Utc>,
) -> Vec<AggregatedEndpointMetrics> {
    let mut groups: HashMap<String, Vec<&MetricSample>> = HashMap::new();
    for sample in window {
        groups.entry(sample.key()).or_default().push(sample);
    }

    groups
        .into_values()
        .filter_map(|group| summarize_group(&group, now))
        .collect()
}

fn summarize_group(
    group: &[&MetricSample],
    now: DateTime<Utc>,
) -> Option<AggregatedEndpointMetrics> {
    let first = group.first()?;
    let count = group.len();

    let mut durations: Vec<f64> = group.iter().map(|s| s.duration_ms).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let sum: f64 = durations.iter().sum();
    let hits = group.iter().filter(|s| s.cache_hit).count();
    let errors = group.iter().filter(|s| s.is_error()).count();

    Some(AggregatedEndpointMetrics {
        endpoint: first.endpoint.clone(),
        method: first.method.clone(),
        total_requests: count as u64,
        average_response_time: sum / count as f64,
        p95_response_time: percentile_by_index(&durations, 0.95),
        cache_hit_rate: 100.0 * hits as f64 / count as f64,
        error_rate: 100.0 * errors as f64 / count as f64,
        last_updated: now,
    })
}

// ─── Periodic task ───────────────────────────────────────────────

/// Background loop that runs one aggregation pass per interval.
///
/// Each pass runs in its own task, so a panicking pass is logged and the
/// loop keeps ticking.
pub struct AggregationTask {
    handle: Option<JoinHandle<()>>,
}

impl AggregationTask {
    /// Aggregate `monitor` every `monitor.aggregation_interval()` and log
    /// any alerts the fresh table raises.
    pub fn start(monitor: Arc<PerformanceMonitor>) -> Self {
        let period = monitor.aggregation_interval();
        Self::spawn_with(period, move || {
            let monitor = monitor.clone();
            async move { run_pass(&monitor) }
        })
    }

    /// Run `cycle` every `period`, skipping the immediate first tick.
    pub fn spawn_with<F, Fut>(period: Duration, cycle: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = tokio::spawn(cycle()).await {
                    if e.is_panic() {
                        tracing::error!("aggregation pass panicked; continuing with next interval");
                    } else {
                        tracing::warn!(error = %e, "aggregation pass did not complete");
                    }
                }
            }
        });

        tracing::info!(period_ms = period.as_millis() as u64, "aggregation task started");
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::info!("aggregation task stopped");
        }
    }
}

impl Drop for AggregationTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_pass(monitor: &PerformanceMonitor) {
    let written = monitor.aggregate();
    tracing::debug!(endpoints = written, "aggregation pass complete");

    let alerts = report::evaluate_alerts(&monitor.aggregated(), monitor.thresholds());
    for alert in alerts {
        tracing::warn!(
            kind = ?alert.kind,
            severity = ?alert.severity,
            endpoint = %alert.key,
            observed = alert.observed,
            threshold = alert.threshold,
            "performance alert"
        );
    }
}
