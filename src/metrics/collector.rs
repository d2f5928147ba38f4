//! Thread-safe metrics aggregation.
//!
//! Workers write samples into per-slot buffers they exclusively own between
//! interval boundaries; the collector's flush swaps the buffers out under a
//! short lock and merges them into one snapshot, so the hot path never
//! contends on a shared sorted structure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::report::{BenchmarkResult, OperationStats, ResourceUsage, RunStatus};
use super::Sample;

/// Raw latencies retained for exact end-of-run percentiles before the
/// collector falls back to histogram quantiles
pub const DEFAULT_SAMPLE_RETENTION_LIMIT: usize = 1_000_000;

/// Metrics for one interval window, appended to an ordered series and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSnapshot {
    /// Wall-clock time at the window end
    pub timestamp: DateTime<Utc>,
    /// Seconds since the measurement phase started
    pub elapsed_secs: f64,
    /// Window length in seconds
    pub interval_secs: f64,
    pub count: u64,
    pub qps: f64,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_p999_ms: f64,
    pub latency_max_ms: f64,
    pub error_count: u64,
}

#[derive(Default)]
struct OperationTotals {
    count: u64,
    errors: u64,
    /// Sum over successful operations only
    latency_sum_micros: u64,
}

struct IntervalClock {
    started: Instant,
    last_flush: Instant,
    stopped_elapsed: Option<f64>,
}

impl IntervalClock {
    fn fresh() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_flush: now,
            stopped_elapsed: None,
        }
    }
}

/// Whole-run latency record: exact raw values while within the retention
/// budget, HdrHistogram quantiles afterwards.
struct LatencyStore {
    histogram: Histogram<u64>,
    raw: Option<Vec<u64>>,
    limit: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct LatencySummary {
    avg_ms: f64,
    p50_ms: f64,
    p95_ms: f64,
    p99_ms: f64,
    p999_ms: f64,
    max_ms: f64,
}

impl LatencyStore {
    fn new(limit: usize) -> Self {
        Self {
            // Latencies up to 10 minutes with 3 significant figures
            histogram: Histogram::new_with_bounds(1, 600_000_000, 3).unwrap(),
            raw: Some(Vec::new()),
            limit,
        }
    }

    fn record_all(&mut self, latencies_micros: &[u64]) {
        for &v in latencies_micros {
            let _ = self.histogram.record(v.max(1));
        }
        if let Some(raw) = &mut self.raw {
            raw.extend_from_slice(latencies_micros);
            if raw.len() > self.limit {
                tracing::debug!(
                    retained = raw.len(),
                    limit = self.limit,
                    "latency retention budget exceeded, falling back to histogram quantiles"
                );
                self.raw = None;
            }
        }
    }

    fn summary(&self) -> LatencySummary {
        if let Some(raw) = &self.raw {
            if raw.is_empty() {
                return LatencySummary::default();
            }
            let mut sorted = raw.clone();
            sorted.sort_unstable();
            let sum: u64 = sorted.iter().sum();
            return LatencySummary {
                avg_ms: sum as f64 / sorted.len() as f64 / 1000.0,
                p50_ms: percentile_from_sorted(&sorted, 50.0) as f64 / 1000.0,
                p95_ms: percentile_from_sorted(&sorted, 95.0) as f64 / 1000.0,
                p99_ms: percentile_from_sorted(&sorted, 99.0) as f64 / 1000.0,
                p999_ms: percentile_from_sorted(&sorted, 99.9) as f64 / 1000.0,
                max_ms: *sorted.last().unwrap() as f64 / 1000.0,
            };
        }

        if self.histogram.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            avg_ms: self.histogram.mean() / 1000.0,
            p50_ms: self.histogram.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: self.histogram.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: self.histogram.value_at_percentile(99.0) as f64 / 1000.0,
            p999_ms: self.histogram.value_at_percentile(99.9) as f64 / 1000.0,
            max_ms: self.histogram.max() as f64 / 1000.0,
        }
    }

    fn reset(&mut self) {
        self.histogram.reset();
        self.raw = Some(Vec::new());
    }
}

/// Latency value below which `percent` of the sorted set falls, using the
/// index formula `⌈p·n⌉ − 1`.
pub(crate) fn percentile_from_sorted(sorted: &[u64], percent: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (percent / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Thread-safe sample aggregator for one benchmark run.
pub struct MetricsCollector {
    buffers: Vec<Mutex<Vec<Sample>>>,
    per_operation: DashMap<String, OperationTotals>,
    store: Mutex<LatencyStore>,
    total_count: AtomicU64,
    error_count: AtomicU64,
    snapshots: Mutex<Vec<IntervalSnapshot>>,
    clock: Mutex<IntervalClock>,
}

impl MetricsCollector {
    /// Create a collector with one buffer per worker slot.
    pub fn new(slots: usize, retention_limit: usize) -> Self {
        Self {
            buffers: (0..slots.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
            per_operation: DashMap::new(),
            store: Mutex::new(LatencyStore::new(retention_limit)),
            total_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            snapshots: Mutex::new(Vec::new()),
            clock: Mutex::new(IntervalClock::fresh()),
        }
    }

    /// Record one sample into the owning worker's buffer.
    pub fn record(&self, slot: usize, sample: Sample) {
        self.total_count.fetch_add(1, Ordering::Relaxed);
        if sample.outcome.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut totals = self
                .per_operation
                .entry(sample.operation_id.clone())
                .or_default();
            totals.count += 1;
            if sample.outcome.is_error() {
                totals.errors += 1;
            } else {
                totals.latency_sum_micros += sample.latency.as_micros() as u64;
            }
        }

        let buffer = &self.buffers[slot % self.buffers.len()];
        buffer.lock().unwrap().push(sample);
    }

    /// Close the current interval: swap out every worker buffer, merge the
    /// retired samples into one snapshot, and append it to the series.
    pub fn flush_interval(&self) -> IntervalSnapshot {
        let now = Instant::now();
        let (elapsed_secs, interval_secs) = {
            let mut clock = self.clock.lock().unwrap();
            let interval = now.duration_since(clock.last_flush).as_secs_f64();
            clock.last_flush = now;
            (now.duration_since(clock.started).as_secs_f64(), interval)
        };

        let mut merged: Vec<Sample> = Vec::new();
        for buffer in &self.buffers {
            let mut guard = buffer.lock().unwrap();
            merged.append(&mut guard);
        }

        let count = merged.len() as u64;
        let error_count = merged.iter().filter(|s| s.outcome.is_error()).count() as u64;

        let mut latencies: Vec<u64> = merged
            .iter()
            .filter(|s| !s.outcome.is_error())
            .map(|s| s.latency.as_micros() as u64)
            .collect();
        latencies.sort_unstable();

        self.store.lock().unwrap().record_all(&latencies);

        let (avg_ms, max_ms) = if latencies.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: u64 = latencies.iter().sum();
            (
                sum as f64 / latencies.len() as f64 / 1000.0,
                *latencies.last().unwrap() as f64 / 1000.0,
            )
        };

        let qps = if interval_secs > 0.0 {
            count as f64 / interval_secs
        } else {
            0.0
        };

        let snapshot = IntervalSnapshot {
            timestamp: Utc::now(),
            elapsed_secs,
            interval_secs,
            count,
            qps,
            latency_avg_ms: avg_ms,
            latency_p50_ms: percentile_from_sorted(&latencies, 50.0) as f64 / 1000.0,
            latency_p95_ms: percentile_from_sorted(&latencies, 95.0) as f64 / 1000.0,
            latency_p99_ms: percentile_from_sorted(&latencies, 99.0) as f64 / 1000.0,
            latency_p999_ms: percentile_from_sorted(&latencies, 99.9) as f64 / 1000.0,
            latency_max_ms: max_ms,
            error_count,
        };

        self.snapshots.lock().unwrap().push(snapshot.clone());
        snapshot
    }

    /// Mark the end of the measurement window. Samples recorded afterwards
    /// (drain stragglers) still count, but QPS is computed against the
    /// elapsed time frozen here.
    pub fn stop(&self) {
        let mut clock = self.clock.lock().unwrap();
        if clock.stopped_elapsed.is_none() {
            clock.stopped_elapsed = Some(clock.started.elapsed().as_secs_f64());
        }
    }

    /// Discard everything recorded so far and restart the clock. Called at
    /// the warmup/measurement boundary.
    pub fn reset(&self) {
        for buffer in &self.buffers {
            buffer.lock().unwrap().clear();
        }
        self.per_operation.clear();
        self.store.lock().unwrap().reset();
        self.total_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.snapshots.lock().unwrap().clear();
        *self.clock.lock().unwrap() = IntervalClock::fresh();
    }

    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Build the final result from everything recorded since the last reset.
    pub fn finalize(&self, status: RunStatus, resources: ResourceUsage) -> BenchmarkResult {
        let elapsed_secs = {
            let clock = self.clock.lock().unwrap();
            clock
                .stopped_elapsed
                .unwrap_or_else(|| clock.started.elapsed().as_secs_f64())
        };

        let total = self.total_count();
        let errors = self.error_count();
        let summary = self.store.lock().unwrap().summary();

        let per_operation: BTreeMap<String, OperationStats> = self
            .per_operation
            .iter()
            .map(|entry| {
                let totals = entry.value();
                let successes = totals.count - totals.errors;
                let avg = if successes > 0 {
                    totals.latency_sum_micros as f64 / successes as f64 / 1000.0
                } else {
                    0.0
                };
                (
                    entry.key().clone(),
                    OperationStats {
                        count: totals.count,
                        avg_latency_ms: avg,
                        error_count: totals.errors,
                    },
                )
            })
            .collect();

        BenchmarkResult {
            run_id: Uuid::new_v4(),
            status,
            total_operations: total,
            elapsed_secs,
            qps: if elapsed_secs > 0.0 {
                total as f64 / elapsed_secs
            } else {
                0.0
            },
            latency_avg_ms: summary.avg_ms,
            latency_p50_ms: summary.p50_ms,
            latency_p95_ms: summary.p95_ms,
            latency_p99_ms: summary.p99_ms,
            latency_p999_ms: summary.p999_ms,
            latency_max_ms: summary.max_ms,
            error_count: errors,
            error_rate_percent: if total > 0 {
                errors as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            intervals: self.snapshots.lock().unwrap().clone(),
            per_operation,
            resources,
        }
    }
}
