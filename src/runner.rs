//! Benchmark orchestration: sequences warmup, measurement, and cooldown
//! around the worker pool, flushes interval snapshots, and assembles the
//! final result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::config::BenchmarkConfig;
use crate::error::Result;
use crate::executor::OperationExecutor;
use crate::metrics::{BenchmarkResult, MetricsCollector, ResourceUsage, RunStatus};
use crate::pool::{ConcurrencyManager, PoolConfig, PoolOutcome};
use crate::workload::{OperationDefinition, WorkloadRegistry};

/// Benchmark phases, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Warmup,
    Running,
    Cooldown,
    Done,
    Aborted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Warmup => write!(f, "warmup"),
            Phase::Running => write!(f, "running"),
            Phase::Cooldown => write!(f, "cooldown"),
            Phase::Done => write!(f, "done"),
            Phase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Orchestrates one benchmark run. Constructed per run; holds no
/// process-wide state.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    registry: Arc<WorkloadRegistry>,
    executor: Arc<dyn OperationExecutor>,
    collector: Arc<MetricsCollector>,
}

impl BenchmarkRunner {
    /// INIT: validate the configuration, freeze the operation catalog, and
    /// size the collector. Invalid configuration never starts a run.
    pub fn new(
        config: BenchmarkConfig,
        operations: Vec<OperationDefinition>,
        executor: Arc<dyn OperationExecutor>,
    ) -> Result<Self> {
        config.validate()?;

        let mut builder = WorkloadRegistry::builder(config.distribution.clone());
        for op in operations {
            builder.register(op)?;
        }
        let registry = Arc::new(builder.build()?);

        let collector = Arc::new(MetricsCollector::new(
            config.pattern.max_concurrency,
            config.sample_retention_limit,
        ));

        tracing::debug!(
            phase = %Phase::Init,
            operations = registry.len(),
            max_concurrency = config.pattern.max_concurrency,
            "benchmark components initialized"
        );

        Ok(Self {
            config,
            registry,
            executor,
            collector,
        })
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    /// Run all phases and return the result. Only configuration problems
    /// surface as errors (from [`BenchmarkRunner::new`]); fatal backend
    /// streaks end the run with an aborted partial result instead.
    pub async fn run(&self) -> BenchmarkResult {
        let pool = Arc::new(ConcurrencyManager::new(
            self.registry.clone(),
            self.executor.clone(),
            self.collector.clone(),
            self.config.pattern.clone(),
            PoolConfig {
                tick: Duration::from_millis(self.config.tick_millis),
                op_timeout: Duration::from_secs(self.config.op_timeout_secs),
                max_consecutive_fatal_failures: self.config.max_consecutive_fatal_failures,
            },
        ));

        // WARMUP: same pattern over the warmup horizon; everything recorded
        // here is discarded before measurement starts.
        if self.config.warmup_secs > 0 {
            tracing::info!(phase = %Phase::Warmup, secs = self.config.warmup_secs, "starting warmup");
            let outcome = pool
                .run(
                    Duration::from_secs(self.config.warmup_secs),
                    Duration::from_secs(5),
                )
                .await;
            self.collector.reset();
            if outcome == PoolOutcome::Aborted {
                tracing::error!(phase = %Phase::Aborted, "backend failed fatally during warmup");
                return self
                    .collector
                    .finalize(RunStatus::Aborted, ResourceUsage::default());
            }
        } else {
            self.collector.reset();
        }

        tracing::info!(
            phase = %Phase::Running,
            secs = self.config.duration_secs,
            pattern = %self.config.pattern.kind,
            max_concurrency = self.config.pattern.max_concurrency,
            "starting measurement"
        );

        let monitor = Arc::new(ResourceMonitor::default());
        let sampler_stop = Arc::new(AtomicBool::new(false));
        let sampler = tokio::spawn(sample_resources(monitor.clone(), sampler_stop.clone()));

        let mut pool_task = {
            let pool = pool.clone();
            let horizon = Duration::from_secs(self.config.duration_secs);
            let drain = Duration::from_secs(self.config.cooldown_secs.max(1));
            tokio::spawn(async move { pool.run(horizon, drain).await })
        };

        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                res = &mut pool_task => {
                    break res.unwrap_or_else(|e| {
                        tracing::error!(error = %e, "worker pool task failed");
                        PoolOutcome::Aborted
                    });
                }
                _ = ticker.tick() => {
                    let snapshot = self.collector.flush_interval();
                    tracing::info!(
                        elapsed_secs = snapshot.elapsed_secs as u64,
                        count = snapshot.count,
                        qps = format_args!("{:.1}", snapshot.qps),
                        p95_ms = format_args!("{:.1}", snapshot.latency_p95_ms),
                        p99_ms = format_args!("{:.1}", snapshot.latency_p99_ms),
                        errors = snapshot.error_count,
                        "interval snapshot"
                    );
                }
            }
        };

        tracing::info!(phase = %Phase::Cooldown, "in-flight operations drained");

        // Close the partial tail interval (includes drain stragglers)
        self.collector.flush_interval();

        sampler_stop.store(true, Ordering::SeqCst);
        let _ = sampler.await;
        let resources = monitor.summary();

        let status = match outcome {
            PoolOutcome::Completed => {
                tracing::info!(phase = %Phase::Done, "benchmark completed");
                RunStatus::Completed
            }
            PoolOutcome::Aborted => {
                tracing::error!(phase = %Phase::Aborted, "benchmark aborted, returning partial result");
                RunStatus::Aborted
            }
        };

        self.collector.finalize(status, resources)
    }
}

#[derive(Default)]
struct ResourceAccum {
    cpu_sum: f64,
    cpu_max: f32,
    mem_sum: f64,
    mem_max: f64,
    samples: u64,
}

/// Accumulates CPU/RSS samples taken during the measurement phase.
#[derive(Default)]
struct ResourceMonitor {
    accum: Mutex<ResourceAccum>,
}

impl ResourceMonitor {
    fn record(&self, cpu: f32, memory_mb: f64) {
        let mut accum = self.accum.lock().unwrap();
        accum.cpu_sum += cpu as f64;
        accum.cpu_max = accum.cpu_max.max(cpu);
        accum.mem_sum += memory_mb;
        accum.mem_max = accum.mem_max.max(memory_mb);
        accum.samples += 1;
    }

    fn summary(&self) -> ResourceUsage {
        let accum = self.accum.lock().unwrap();
        if accum.samples == 0 {
            return ResourceUsage::default();
        }
        ResourceUsage {
            avg_cpu: (accum.cpu_sum / accum.samples as f64) as f32,
            max_cpu: accum.cpu_max,
            avg_memory_mb: accum.mem_sum / accum.samples as f64,
            max_memory_mb: accum.mem_max,
        }
    }
}

async fn sample_resources(monitor: Arc<ResourceMonitor>, stop: Arc<AtomicBool>) {
    let mut sys = System::new_all();
    let pid: Option<Pid> = sysinfo::get_current_pid().ok();

    while !stop.load(Ordering::SeqCst) {
        sys.refresh_cpu_usage();
        let cpu = sys.global_cpu_usage();

        let memory_mb = match pid {
            Some(pid) => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid)
                    .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
                    .unwrap_or(0.0)
            }
            None => 0.0,
        };

        monitor.record(cpu, memory_mb);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Init.to_string(), "init");
        assert_eq!(Phase::Warmup.to_string(), "warmup");
        assert_eq!(Phase::Running.to_string(), "running");
        assert_eq!(Phase::Cooldown.to_string(), "cooldown");
        assert_eq!(Phase::Done.to_string(), "done");
        assert_eq!(Phase::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_resource_monitor_summary() {
        let monitor = ResourceMonitor::default();
        assert_eq!(monitor.summary().avg_cpu, 0.0);

        monitor.record(10.0, 100.0);
        monitor.record(30.0, 200.0);
        let summary = monitor.summary();
        assert!((summary.avg_cpu - 20.0).abs() < 0.01);
        assert_eq!(summary.max_cpu, 30.0);
        assert!((summary.avg_memory_mb - 150.0).abs() < 0.01);
        assert_eq!(summary.max_memory_mb, 200.0);
    }
}
