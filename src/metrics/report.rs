use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregator::AggregatedEndpointMetrics;
use super::collector::PerformanceMonitor;
use super::percentiles::PercentileSet;
use super::MetricSample;
use crate::config::AlertThresholds;

const SLOWEST_LIMIT: usize = 5;
const RECENT_ERRORS_LIMIT: usize = 10;

// ─── Report types ────────────────────────────────────────────────

/// Read-only view over the monitor. Building one never mutates state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub endpoints: Vec<AggregatedEndpointMetrics>,
    pub slowest_endpoints: Vec<AggregatedEndpointMetrics>,
    pub recent_errors: Vec<MetricSample>,
    pub alerts: Vec<Alert>,
}

/// Totals over every buffered sample (not just the last window).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_requests: u64,
    pub average_response_time: f64,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub latency: PercentileSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    SlowResponse,
    SlowTail,
    HighErrorRate,
    LowCacheHitRate,
    CacheDegraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    /// Endpoint key, or "cache" for tier-level alerts
    pub key: String,
    pub observed: f64,
    pub threshold: f64,
}

// ─── Alert evaluation ────────────────────────────────────────────

/// Compare every aggregated row against the thresholds.
/// Critical when the observed value is at least twice as far past the line.
pub fn evaluate_alerts(
    rows: &[AggregatedEndpointMetrics],
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for row in rows {
        let key = row.key();

        if row.average_response_time > thresholds.max_average_ms {
            alerts.push(Alert {
                kind: AlertKind::SlowResponse,
                severity: above(row.average_response_time, thresholds.max_average_ms),
                key: key.clone(),
                observed: row.average_response_time,
                threshold: thresholds.max_average_ms,
            });
        }
        if row.p95_response_time > thresholds.max_p95_ms {
            alerts.push(Alert {
                kind: AlertKind::SlowTail,
                severity: above(row.p95_response_time, thresholds.max_p95_ms),
                key: key.clone(),
                observed: row.p95_response_time,
                threshold: thresholds.max_p95_ms,
            });
        }
        if row.error_rate > thresholds.max_error_rate {
            alerts.push(Alert {
                kind: AlertKind::HighErrorRate,
                severity: above(row.error_rate, thresholds.max_error_rate),
                key: key.clone(),
                observed: row.error_rate,
                threshold: thresholds.max_error_rate,
            });
        }
        if row.total_requests >= thresholds.min_requests_for_hit_rate
            && row.cache_hit_rate < thresholds.min_cache_hit_rate
        {
            let severity = if row.cache_hit_rate * 2.0 <= thresholds.min_cache_hit_rate {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert {
                kind: AlertKind::LowCacheHitRate,
                severity,
                key,
                observed: row.cache_hit_rate,
                threshold: thresholds.min_cache_hit_rate,
            });
        }
    }

    alerts
}

fn above(observed: f64, threshold: f64) -> Severity {
    if observed >= threshold * 2.0 {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

/// Alert raised when a configured distributed tier is unreachable.
pub fn cache_degraded_alert() -> Alert {
    Alert {
        kind: AlertKind::CacheDegraded,
        severity: Severity::Warning,
        key: "cache".into(),
        observed: 0.0,
        threshold: 1.0,
    }
}

// ─── Report generation ───────────────────────────────────────────

impl PerformanceMonitor {
    pub fn report(&self) -> PerformanceReport {
        let (summary, recent_errors) = self.read(|samples, _| {
            let errors: Vec<MetricSample> = samples
                .iter()
                .rev()
                .filter(|s| s.error_message.is_some())
                .take(RECENT_ERRORS_LIMIT)
                .cloned()
                .collect();
            (summarize_all(samples.iter()), errors)
        });

        let endpoints = self.aggregated();

        let mut slowest = endpoints.clone();
        slowest.sort_by(|a, b| {
            b.average_response_time
                .total_cmp(&a.average_response_time)
                .then_with(|| a.key().cmp(&b.key()))
        });
        slowest.truncate(SLOWEST_LIMIT);

        let alerts = evaluate_alerts(&endpoints, self.thresholds());

        PerformanceReport {
            generated_at: Utc::now(),
            summary,
            endpoints,
            slowest_endpoints: slowest,
            recent_errors,
            alerts,
        }
    }
}

fn summarize_all<'a>(samples: impl Iterator<Item = &'a MetricSample> + Clone) -> ReportSummary {
    let mut total = 0u64;
    let mut sum = 0.0;
    let mut hits = 0u64;
    let mut errors = 0u64;
    for s in samples.clone() {
        total += 1;
        sum += s.duration_ms;
        if s.cache_hit {
            hits += 1;
        }
        if s.is_error() {
            errors += 1;
        }
    }

    let pct = |n: u64| if total == 0 { 0.0 } else { 100.0 * n as f64 / total as f64 };
    ReportSummary {
        total_requests: total,
        average_response_time: if total == 0 { 0.0 } else { sum / total as f64 },
        cache_hit_rate: pct(hits),
        error_rate: pct(errors),
        latency: PercentileSet::from_durations_ms(samples.map(|s| s.duration_ms)),
    }
}
