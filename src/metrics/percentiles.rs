use hdrhistogram::Histogram;
use serde::Serialize;

/// HdrHistogram range: 1 μs → 10 min, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 600_000_000;
const HIST_SIGFIG: u8 = 3;

/// Exact percentile over an ascending slice: `sorted[floor(len × q)]`,
/// clamped to the last element. Empty input yields 0.
pub fn percentile_by_index(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * q).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Latency breakdown in milliseconds.
/// Serialized straight into the performance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileSet {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub count: u64,
}

impl PercentileSet {
    /// Build a set from raw millisecond durations.
    /// Values are histogrammed at microsecond resolution; negative and
    /// non-finite durations are skipped.
    pub fn from_durations_ms<I>(durations: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let Ok(mut hist) = Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        else {
            return Self::empty();
        };
        for ms in durations {
            if !ms.is_finite() || ms < 0.0 {
                continue;
            }
            let us = ((ms * 1_000.0).round() as u64).clamp(HIST_LOW, HIST_HIGH);
            let _ = hist.record(us);
        }
        Self::from_histogram(&hist)
    }

    /// Extract a full percentile set from a microsecond histogram.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        let ms = |us: u64| us as f64 / 1_000.0;
        Self {
            min: ms(hist.min()),
            max: ms(hist.max()),
            mean: hist.mean() / 1_000.0,
            p50: ms(hist.value_at_percentile(50.0)),
            p95: ms(hist.value_at_percentile(95.0)),
            p99: ms(hist.value_at_percentile(99.0)),
            p999: ms(hist.value_at_percentile(99.9)),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
            p999: 0.0,
            count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
