// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics recording for client operations.
//!
//! [`Recorder`] is the sink the metrics decorator writes to. [`Metrics`] is
//! the in-process implementation: a call count, duration totals and a
//! latency histogram per operation label. Exporting these numbers to a
//! metrics backend is left to the application.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::error::ConfigError;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Sink for one observation per client call.
///
/// Recording is fire-and-forget: it has no return value, must not block for
/// long, and any internal failure stays inside the recorder.
pub trait Recorder: Send + Sync {
    /// Record one call of `operation` that took `elapsed`.
    fn record(&self, operation: &str, elapsed: Duration);
}

/// Recorder that writes to [`GLOBAL_METRICS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalRecorder;

impl Recorder for GlobalRecorder {
    fn record(&self, operation: &str, elapsed: Duration) {
        GLOBAL_METRICS.record(operation, elapsed);
    }
}

/// Default latency buckets in microseconds: 100us, 1ms, 10ms, 100ms, 1s, 10s.
pub const DEFAULT_BUCKETS: [u64; 6] = [100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000];

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Operation metrics by label.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    /// Histogram bucket boundaries shared by every operation.
    buckets: Vec<u64>,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector with the default buckets.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            buckets: DEFAULT_BUCKETS.to_vec(),
            start_time: Instant::now(),
        }
    }

    /// Create a collector with custom histogram buckets (in microseconds).
    ///
    /// Buckets must be non-empty and strictly increasing.
    pub fn with_buckets(buckets: Vec<u64>) -> Result<Self, ConfigError> {
        Histogram::validate(&buckets)?;
        Ok(Self {
            buckets,
            ..Self::new()
        })
    }

    /// Record one call of `operation`.
    pub fn record(&self, operation: &str, elapsed: Duration) {
        // A poisoned lock still holds consistent counters; keep recording.
        let mut ops = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match ops.get_mut(operation) {
            Some(metrics) => metrics.record(elapsed),
            None => {
                let histogram = Histogram::with_buckets(self.buckets.clone());
                let mut metrics = OperationMetrics::with_histogram(histogram);
                metrics.record(elapsed);
                ops.insert(operation.to_string(), metrics);
            }
        }
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, operation: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .cloned()
    }

    /// Number of calls recorded for `operation`.
    pub fn count(&self, operation: &str) -> u64 {
        self.operation_metrics(operation).map_or(0, |m| m.count)
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self
            .operations
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        MetricsSnapshot {
            operations: operations.clone(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for Metrics {
    fn record(&self, operation: &str, elapsed: Duration) {
        Metrics::record(self, operation, elapsed);
    }
}

/// Aggregates for one operation label.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    /// Fastest call, `None` before the first one.
    pub min_duration: Option<Duration>,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    fn with_histogram(histogram: Histogram) -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: None,
            max_duration: Duration::ZERO,
            histogram,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total_duration = self.total_duration.saturating_add(elapsed);
        self.min_duration = Some(self.min_duration.map_or(elapsed, |min| min.min(elapsed)));
        self.max_duration = self.max_duration.max(elapsed);
        self.histogram.record(elapsed);
    }

    /// Mean call duration, `None` before the first call.
    pub fn mean(&self) -> Option<Duration> {
        u32::try_from(self.count)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.total_duration / n)
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::with_histogram(Histogram::default())
    }
}

/// Fixed-bucket latency histogram.
///
/// Bucket `i` counts calls no slower than `bounds[i]`; one extra bucket
/// counts everything slower than the last bound.
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds: Vec<Duration>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Histogram with the given upper bounds, in microseconds.
    ///
    /// Bounds are not checked here; see [`Histogram::validate`].
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let bounds: Vec<Duration> = buckets.into_iter().map(Duration::from_micros).collect();
        let counts = vec![0; bounds.len() + 1];
        Self { bounds, counts }
    }

    /// Bounds must be non-empty and strictly increasing.
    pub fn validate(buckets: &[u64]) -> Result<(), ConfigError> {
        if buckets.is_empty() {
            return Err(ConfigError::invalid("buckets", "must not be empty"));
        }
        if buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::invalid("buckets", "must be strictly increasing"));
        }
        Ok(())
    }

    pub fn record(&mut self, elapsed: Duration) {
        let slot = self.bounds.partition_point(|&bound| bound < elapsed);
        self.counts[slot] += 1;
    }

    /// Calls per bucket; the last entry is the overflow bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bounds in microseconds.
    pub fn buckets(&self) -> Vec<u64> {
        self.bounds.iter().map(|b| b.as_micros() as u64).collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Upper bound of the bucket holding the `p`th percentile (0-100).
    ///
    /// Overflow reports the last bound. Zero when empty.
    pub fn percentile(&self, p: f64) -> Duration {
        let total = self.total();
        if total == 0 {
            return Duration::ZERO;
        }
        let rank = ((total as f64) * p.clamp(0.0, 100.0) / 100.0).ceil().max(1.0) as u64;

        let mut seen = 0;
        let slot = self
            .counts
            .iter()
            .position(|&count| {
                seen += count;
                seen >= rank
            })
            .unwrap_or(self.bounds.len());
        self.bounds
            .get(slot)
            .or_else(|| self.bounds.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p90(&self) -> Duration {
        self.percentile(90.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS.to_vec())
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Operation metrics by label.
    pub operations: HashMap<String, OperationMetrics>,

    /// Uptime when snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Total calls across all operations.
    pub fn total_calls(&self) -> u64 {
        self.operations.values().map(|m| m.count).sum()
    }

    /// Format as a human-readable report, operations sorted by label.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Client Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!("Calls: {}\n", self.total_calls()));

        if !self.operations.is_empty() {
            let mut labels: Vec<_> = self.operations.keys().collect();
            labels.sort();

            report.push_str("\nOperations:\n");
            for label in labels {
                let metrics = &self.operations[label];
                report.push_str(&format!(
                    "  {}: {} calls, mean {:.2?}, max {:.2?}, p99 <= {:.2?}\n",
                    label,
                    metrics.count,
                    metrics.mean().unwrap_or_default(),
                    metrics.max_duration,
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}
