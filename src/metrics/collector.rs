use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::aggregator::{self, AggregatedEndpointMetrics};
use super::MetricSample;
use crate::config::{AlertThresholds, MonitoringConfig};

// ─── Configuration ───────────────────────────────────────────────

/// Default number of individual request records kept in memory.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default trailing window for one aggregation pass (5 minutes).
pub const DEFAULT_AGGREGATION_INTERVAL: Duration = Duration::from_millis(300_000);

// ─── Public types ────────────────────────────────────────────────

/// Anything that can accept a finished request sample.
pub trait SampleSink: Send + Sync {
    fn record(&self, sample: MetricSample);
}

/// Thread-safe performance monitor.
/// The cached-request wrapper calls `record()`, the aggregator folds,
/// and the report endpoint reads.
pub struct PerformanceMonitor {
    inner: Mutex<Inner>,
    capacity: usize,
    aggregation_interval: Duration,
    thresholds: AlertThresholds,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // Oldest sample at the front
    samples: VecDeque<MetricSample>,

    // "{METHOD}:{endpoint}" → last computed summary
    aggregates: HashMap<String, AggregatedEndpointMetrics>,
}

impl Inner {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024) + 1),
            aggregates: HashMap::new(),
        }
    }
}

// ─── PerformanceMonitor impl ─────────────────────────────────────

impl PerformanceMonitor {
    pub fn new(
        capacity: usize,
        aggregation_interval: Duration,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::new(capacity)),
            capacity,
            aggregation_interval,
            thresholds,
        }
    }

    pub fn from_config(cfg: &MonitoringConfig) -> Self {
        Self::new(cfg.capacity, cfg.aggregation_interval(), cfg.alerts)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn aggregation_interval(&self) -> Duration {
        self.aggregation_interval
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Append one sample, dropping the oldest ones once over capacity.
    pub fn record(&self, sample: MetricSample) {
        let mut inner = self.inner.lock();
        inner.samples.push_back(sample);
        while inner.samples.len() > self.capacity {
            inner.samples.pop_front();
        }
    }

    /// The last `limit` samples, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<MetricSample> {
        let inner = self.inner.lock();
        let skip = inner.samples.len().saturating_sub(limit);
        inner.samples.iter().skip(skip).cloned().collect()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Wipe samples and the aggregated table.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::new(self.capacity);
    }

    /// Fold the trailing window ending now into the aggregated table.
    pub fn aggregate(&self) -> usize {
        self.aggregate_at(Utc::now())
    }

    /// Fold samples newer than `now - aggregation_interval`.
    /// Returns how many endpoint entries were written.
    pub fn aggregate_at(&self, now: DateTime<Utc>) -> usize {
        let window = chrono::Duration::from_std(self.aggregation_interval)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let window_start = now - window;

        let mut inner = self.inner.lock();
        let summaries = aggregator::summarize(
            inner.samples.iter().filter(|s| s.timestamp > window_start),
            now,
        );
        let written = summaries.len();
        for summary in summaries {
            inner.aggregates.insert(summary.key(), summary);
        }
        written
    }

    /// Aggregated entries sorted by key.
    pub fn aggregated(&self) -> Vec<AggregatedEndpointMetrics> {
        let inner = self.inner.lock();
        let mut rows: Vec<_> = inner.aggregates.values().cloned().collect();
        rows.sort_by_key(|r| r.key());
        rows
    }

    /// Run `f` against a consistent view of samples and aggregates.
    pub(crate) fn read<R>(
        &self,
        f: impl FnOnce(&VecDeque<MetricSample>, &HashMap<String, AggregatedEndpointMetrics>) -> R,
    ) -> R {
        let inner = self.inner.lock();
        f(&inner.samples, &inner.aggregates)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAPACITY,
            DEFAULT_AGGREGATION_INTERVAL,
            AlertThresholds::default(),
        )
    }
}

impl SampleSink for PerformanceMonitor {
    fn record(&self, sample: MetricSample) {
        PerformanceMonitor::record(self, sample);
    }
}

// ─── Optional validation decorator ───────────────────────────────

/// Drops samples whose duration is negative or not finite before they
/// reach the wrapped monitor.
pub struct ValidatingRecorder {
    inner: Arc<PerformanceMonitor>,
}

impl ValidatingRecorder {
    pub fn new(inner: Arc<PerformanceMonitor>) -> Self {
        Self { inner }
    }
}

impl SampleSink for ValidatingRecorder {
    fn record(&self, sample: MetricSample) {
        if !sample.duration_ms.is_finite() || sample.duration_ms < 0.0 {
            tracing::warn!(
                endpoint = %sample.endpoint,
                duration_ms = sample.duration_ms,
                "dropping metric sample with invalid duration"
            );
            return;
        }
        self.inner.record(sample);
    }
}
