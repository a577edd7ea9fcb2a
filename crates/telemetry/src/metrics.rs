//! In-process metrics.
//!
//! Counters, gauges and latency histograms updated by the pipeline, the
//! storage backends and the HTTP layer. Read through [`Metrics::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturates at zero
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 30s, +Inf
    buckets: [AtomicU64; 12],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Bucket upper bounds with their counts; `None` is the overflow bucket.
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .map(|&b| Some(b))
            .chain(std::iter::once(None))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Metrics of the MovieFlix service.
#[derive(Debug, Default)]
pub struct Metrics {
    // Pipeline runs
    pub runs_started: Counter,
    pub runs_succeeded: Counter,
    pub runs_failed: Counter,
    pub runs_rejected_in_progress: Counter,

    // Rows
    pub rows_staged: Counter,
    pub rows_loaded: Counter,
    pub rows_rejected: Counter,
    pub rows_clamped: Counter,

    // Exports
    pub exports_written: Counter,
    pub export_rows: Counter,

    // Storage
    pub store_queries: Counter,
    pub store_errors: Counter,

    // HTTP
    pub insight_requests: Counter,
    pub insight_cache_hits: Counter,
    pub catalog_writes: Counter,

    // Latency histograms
    pub run_latency_ms: Histogram,
    pub stage_latency_ms: Histogram,
    pub warehouse_latency_ms: Histogram,
    pub export_latency_ms: Histogram,
    pub store_latency_ms: Histogram,

    // Gauges
    pub run_active: Gauge,
    pub last_run_finished_at: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_rejected_in_progress: u64,
    pub rows_staged: u64,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    pub rows_clamped: u64,
    pub exports_written: u64,
    pub export_rows: u64,
    pub store_queries: u64,
    pub store_errors: u64,
    pub insight_requests: u64,
    pub insight_cache_hits: u64,
    pub catalog_writes: u64,
    pub run_latency_mean_ms: f64,
    pub stage_latency_mean_ms: f64,
    pub warehouse_latency_mean_ms: f64,
    pub export_latency_mean_ms: f64,
    pub store_latency_mean_ms: f64,
    pub run_active: bool,
    /// Unix millis of the last finished run, if any.
    pub last_run_finished_at: Option<u64>,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_run = self.last_run_finished_at.get();
        MetricsSnapshot {
            timestamp: Utc::now(),
            runs_started: self.runs_started.get(),
            runs_succeeded: self.runs_succeeded.get(),
            runs_failed: self.runs_failed.get(),
            runs_rejected_in_progress: self.runs_rejected_in_progress.get(),
            rows_staged: self.rows_staged.get(),
            rows_loaded: self.rows_loaded.get(),
            rows_rejected: self.rows_rejected.get(),
            rows_clamped: self.rows_clamped.get(),
            exports_written: self.exports_written.get(),
            export_rows: self.export_rows.get(),
            store_queries: self.store_queries.get(),
            store_errors: self.store_errors.get(),
            insight_requests: self.insight_requests.get(),
            insight_cache_hits: self.insight_cache_hits.get(),
            catalog_writes: self.catalog_writes.get(),
            run_latency_mean_ms: self.run_latency_ms.mean(),
            stage_latency_mean_ms: self.stage_latency_ms.mean(),
            warehouse_latency_mean_ms: self.warehouse_latency_ms.mean(),
            export_latency_mean_ms: self.export_latency_ms.mean(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            run_active: self.run_active.get() > 0,
            last_run_finished_at: (last_run > 0).then_some(last_run),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
