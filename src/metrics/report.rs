//! Final benchmark result and its renderings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collector::IntervalSnapshot;

/// How the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// All phases ran to completion
    Completed,
    /// The fatal-failure threshold was crossed; the result is partial
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Host resource usage sampled over the measurement phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub avg_cpu: f32,
    pub max_cpu: f32,
    pub avg_memory_mb: f64,
    pub max_memory_mb: f64,
}

/// Rollup for one operation id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub avg_latency_ms: f64,
    pub error_count: u64,
}

/// Aggregate outcome of a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub total_operations: u64,
    pub elapsed_secs: f64,
    pub qps: f64,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_p999_ms: f64,
    pub latency_max_ms: f64,
    pub error_count: u64,
    pub error_rate_percent: f64,
    /// Ordered interval series for the measurement phase
    pub intervals: Vec<IntervalSnapshot>,
    pub per_operation: BTreeMap<String, OperationStats>,
    pub resources: ResourceUsage,
}

impl BenchmarkResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Export the result as pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Print the interval series as an ASCII table
    pub fn print_table(&self) {
        println!();
        println!("┌──────────┬──────────┬──────────┬──────────┬──────────┬──────────┬──────────┬──────────┐");
        println!("│  Elapsed │    Count │    QPS   │  p50(ms) │  p95(ms) │  p99(ms) │  max(ms) │  Errors  │");
        println!("├──────────┼──────────┼──────────┼──────────┼──────────┼──────────┼──────────┼──────────┤");

        for interval in &self.intervals {
            println!(
                "│ {:>7.1}s │ {:>8} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8} │",
                interval.elapsed_secs,
                interval.count,
                interval.qps,
                interval.latency_p50_ms,
                interval.latency_p95_ms,
                interval.latency_p99_ms,
                interval.latency_max_ms,
                interval.error_count,
            );
        }

        println!("└──────────┴──────────┴──────────┴──────────┴──────────┴──────────┴──────────┴──────────┘");
        self.print_summary();
    }

    /// Print a compact summary
    pub fn print_summary(&self) {
        println!();
        println!("=== Benchmark Summary ({}) ===", self.status);
        println!("Total Operations:     {}", self.total_operations);
        println!("Elapsed Time:         {:.2} s", self.elapsed_secs);
        println!("Throughput:           {:.2} ops/s", self.qps);
        println!();
        println!("Latency:");
        println!("  Average:            {:.2} ms", self.latency_avg_ms);
        println!("  p50:                {:.2} ms", self.latency_p50_ms);
        println!("  p95:                {:.2} ms", self.latency_p95_ms);
        println!("  p99:                {:.2} ms", self.latency_p99_ms);
        println!("  p99.9:              {:.2} ms", self.latency_p999_ms);
        println!("  Max:                {:.2} ms", self.latency_max_ms);
        println!();
        println!(
            "Errors:               {} ({:.2}%)",
            self.error_count, self.error_rate_percent
        );
        println!(
            "Resources:            CPU {:.1}% avg / {:.1}% max, RSS {:.0} MB avg / {:.0} MB max",
            self.resources.avg_cpu,
            self.resources.max_cpu,
            self.resources.avg_memory_mb,
            self.resources.max_memory_mb
        );

        if !self.per_operation.is_empty() {
            println!();
            println!("Per-operation:");
            for (id, stats) in &self.per_operation {
                println!(
                    "  {:<32} count={:<8} avg={:>8.2} ms  errors={}",
                    id, stats.count, stats.avg_latency_ms, stats.error_count
                );
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> BenchmarkResult {
        BenchmarkResult {
            run_id: Uuid::new_v4(),
            status: RunStatus::Completed,
            total_operations: 1000,
            elapsed_secs: 10.0,
            qps: 100.0,
            latency_avg_ms: 12.5,
            latency_p50_ms: 10.0,
            latency_p95_ms: 30.0,
            latency_p99_ms: 45.0,
            latency_p999_ms: 70.0,
            latency_max_ms: 90.0,
            error_count: 10,
            error_rate_percent: 1.0,
            intervals: Vec::new(),
            per_operation: BTreeMap::from([(
                "read_simple_1".to_string(),
                OperationStats {
                    count: 1000,
                    avg_latency_ms: 12.5,
                    error_count: 10,
                },
            )]),
            resources: ResourceUsage::default(),
        }
    }

    #[test]
    fn test_json_export_contains_logical_fields() {
        let json = sample_result().to_json();
        assert!(json.contains("\"total_operations\": 1000"));
        assert!(json.contains("\"status\": \"completed\""));
        assert!(json.contains("latency_p999_ms"));
        assert!(json.contains("read_simple_1"));
        assert!(json.contains("error_rate_percent"));
    }

    #[test]
    fn test_status_roundtrip() {
        let mut result = sample_result();
        assert!(result.is_complete());
        result.status = RunStatus::Aborted;
        assert!(!result.is_complete());
        assert_eq!(result.status.to_string(), "aborted");

        let json = serde_json::to_string(&RunStatus::Aborted).unwrap();
        assert_eq!(json, "\"aborted\"");
    }

    #[test]
    fn test_print_does_not_panic() {
        sample_result().print_table();
    }
}
