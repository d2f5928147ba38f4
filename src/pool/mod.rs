//! Dynamically-sized worker pool tracking a time-varying concurrency target.
//!
//! A control loop on a fixed tick compares the live worker count against the
//! load pattern's target, spawns missing workers, and signals excess workers
//! to stop once their in-flight operation finishes.

pub mod worker;

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::executor::OperationExecutor;
use crate::metrics::MetricsCollector;
use crate::pattern::{target_concurrency, LoadPatternConfig};
use crate::workload::WorkloadRegistry;

use worker::{worker_loop, FatalTracker, WorkerContext, WorkerState};

pub use worker::WorkerState as SlotState;

/// Pool tuning knobs
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Control-loop period
    pub tick: Duration,
    /// Per-operation deadline enforced around the executor call
    pub op_timeout: Duration,
    /// Consecutive fatal failures that abort the run (0 disables)
    pub max_consecutive_fatal_failures: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            op_timeout: Duration::from_secs(30),
            max_consecutive_fatal_failures: 5,
        }
    }
}

/// How a pool run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// The horizon elapsed and all workers drained
    Completed,
    /// The fatal-failure latch tripped before the horizon
    Aborted,
}

struct WorkerHandle {
    slot: usize,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.state
            .store(WorkerState::Stopping as u8, Ordering::SeqCst);
    }
}

/// Runs worker tasks whose count tracks the load pattern's target.
pub struct ConcurrencyManager {
    registry: Arc<WorkloadRegistry>,
    executor: Arc<dyn OperationExecutor>,
    collector: Arc<MetricsCollector>,
    pattern: LoadPatternConfig,
    config: PoolConfig,
    live_gauge: AtomicUsize,
}

impl ConcurrencyManager {
    pub fn new(
        registry: Arc<WorkloadRegistry>,
        executor: Arc<dyn OperationExecutor>,
        collector: Arc<MetricsCollector>,
        pattern: LoadPatternConfig,
        config: PoolConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            collector,
            pattern,
            config,
            live_gauge: AtomicUsize::new(0),
        }
    }

    /// Workers currently running (not yet asked to stop), as of the last
    /// control-loop tick.
    pub fn live_workers(&self) -> usize {
        self.live_gauge.load(Ordering::SeqCst)
    }

    /// Drive the pool for `horizon`, then drain in-flight operations bounded
    /// by `drain_timeout`. Blocks until the drain finishes or times out.
    pub async fn run(&self, horizon: Duration, drain_timeout: Duration) -> PoolOutcome {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fatal = Arc::new(FatalTracker::new(self.config.max_consecutive_fatal_failures));
        let ctx = WorkerContext {
            registry: self.registry.clone(),
            executor: self.executor.clone(),
            collector: self.collector.clone(),
            fatal: fatal.clone(),
            op_timeout: self.config.op_timeout,
            shutdown: shutdown_rx,
        };

        let mut workers: Vec<WorkerHandle> = Vec::new();
        let mut free_slots: Vec<usize> = (0..self.pattern.max_concurrency).rev().collect();
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.config.tick);
        let mut aborted = false;

        loop {
            if fatal.is_tripped() {
                aborted = true;
                break;
            }
            let elapsed = start.elapsed();
            if elapsed >= horizon {
                break;
            }

            // Return slots of workers that already exited
            workers.retain(|w| {
                if w.handle.is_finished() {
                    free_slots.push(w.slot);
                    false
                } else {
                    true
                }
            });

            let target = target_concurrency(
                elapsed.as_secs_f64(),
                horizon.as_secs_f64(),
                &self.pattern,
            );
            let live = workers.iter().filter(|w| !w.stop_requested()).count();

            if target > live {
                let spawn_count = (target - live).min(free_slots.len());
                for _ in 0..spawn_count {
                    let slot = free_slots.pop().expect("slot available");
                    let stop = Arc::new(AtomicBool::new(false));
                    let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
                    let handle =
                        tokio::spawn(worker_loop(slot, ctx.clone(), stop.clone(), state.clone()));
                    workers.push(WorkerHandle {
                        slot,
                        stop,
                        state,
                        handle,
                    });
                }
                tracing::debug!(target, live, spawned = spawn_count, "scaled worker pool up");
            } else if live > target {
                // Newest workers stop first
                let mut excess = live - target;
                for w in workers.iter().rev() {
                    if excess == 0 {
                        break;
                    }
                    if !w.stop_requested() {
                        w.request_stop();
                        excess -= 1;
                    }
                }
                tracing::debug!(target, live, stopped = live - target, "scaled worker pool down");
            }

            self.live_gauge.store(
                workers.iter().filter(|w| !w.stop_requested()).count(),
                Ordering::SeqCst,
            );

            tokio::select! {
                _ = ticker.tick() => {}
                _ = fatal.tripped_wait() => {}
            }
        }

        // Freeze the measurement clock before the drain tail
        self.collector.stop();

        let _ = shutdown_tx.send(true);
        for w in &workers {
            w.state
                .store(WorkerState::Stopping as u8, Ordering::SeqCst);
        }
        tracing::info!(
            workers = workers.len(),
            "draining in-flight operations"
        );

        let drain = futures::future::join_all(workers.drain(..).map(|w| w.handle));
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs_f64(),
                "worker drain timed out, abandoning in-flight operations"
            );
        }
        self.live_gauge.store(0, Ordering::SeqCst);

        if aborted {
            tracing::error!("consecutive fatal failure threshold crossed, run aborted");
            PoolOutcome::Aborted
        } else {
            PoolOutcome::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionStatus;
    use crate::metrics::collector::DEFAULT_SAMPLE_RETENTION_LIMIT;
    use crate::workload::{Category, Complexity, OperationDefinition, WorkloadDistribution};
    use async_trait::async_trait;

    struct OkExecutor;

    #[async_trait]
    impl OperationExecutor for OkExecutor {
        async fn execute(&self, _op: &OperationDefinition) -> ExecutionStatus {
            tokio::time::sleep(Duration::from_millis(2)).await;
            ExecutionStatus::Ok
        }
    }

    struct FatalExecutor;

    #[async_trait]
    impl OperationExecutor for FatalExecutor {
        async fn execute(&self, _op: &OperationDefinition) -> ExecutionStatus {
            tokio::time::sleep(Duration::from_millis(1)).await;
            ExecutionStatus::Fatal("connection refused".to_string())
        }
    }

    fn registry() -> Arc<WorkloadRegistry> {
        let distribution = WorkloadDistribution {
            categories: vec![(Category::Read, 1.0)],
            complexities: vec![(Complexity::Simple, 1.0)],
        };
        let mut builder = WorkloadRegistry::builder(distribution);
        builder
            .register(OperationDefinition::new(
                "read_simple",
                Category::Read,
                Complexity::Simple,
            ))
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    fn manager(
        executor: Arc<dyn OperationExecutor>,
        pattern: LoadPatternConfig,
        fatal_threshold: u32,
    ) -> (ConcurrencyManager, Arc<MetricsCollector>) {
        let collector = Arc::new(MetricsCollector::new(
            pattern.max_concurrency,
            DEFAULT_SAMPLE_RETENTION_LIMIT,
        ));
        let config = PoolConfig {
            tick: Duration::from_millis(20),
            op_timeout: Duration::from_secs(1),
            max_consecutive_fatal_failures: fatal_threshold,
        };
        let mgr = ConcurrencyManager::new(
            registry(),
            executor,
            collector.clone(),
            pattern,
            config,
        );
        (mgr, collector)
    }

    #[tokio::test]
    async fn test_pool_completes_and_records_samples() {
        let (mgr, collector) = manager(
            Arc::new(OkExecutor),
            LoadPatternConfig::constant(4),
            0,
        );
        let outcome = mgr
            .run(Duration::from_millis(300), Duration::from_secs(2))
            .await;

        assert_eq!(outcome, PoolOutcome::Completed);
        assert!(collector.total_count() > 0);
        assert_eq!(collector.error_count(), 0);
        assert_eq!(mgr.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_fatal_streak_aborts_early() {
        let (mgr, collector) = manager(
            Arc::new(FatalExecutor),
            LoadPatternConfig::constant(2),
            3,
        );
        let begin = Instant::now();
        let outcome = mgr
            .run(Duration::from_secs(30), Duration::from_secs(2))
            .await;

        assert_eq!(outcome, PoolOutcome::Aborted);
        assert!(begin.elapsed() < Duration::from_secs(10));
        assert!(collector.total_count() >= 3);
        assert_eq!(collector.error_count(), collector.total_count());
    }

    #[tokio::test]
    async fn test_spike_pattern_scales_down() {
        // 20ms tick, 60ms high window per 200ms period: the pool must shed
        // workers once the spike window passes.
        let pattern = LoadPatternConfig {
            kind: crate::pattern::PatternKind::Spike,
            max_concurrency: 8,
            spike_period_secs: 0.2,
            spike_duty_cycle: 0.3,
            ..Default::default()
        };
        let (mgr, _collector) = manager(Arc::new(OkExecutor), pattern, 0);
        let mgr = Arc::new(mgr);

        let run = {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                mgr.run(Duration::from_millis(400), Duration::from_secs(2))
                    .await
            })
        };

        let mut seen_high = false;
        let mut seen_low_after_high = false;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let live = mgr.live_workers();
            if live >= 7 {
                seen_high = true;
            }
            if seen_high && live <= 3 && live > 0 {
                seen_low_after_high = true;
            }
        }
        run.await.unwrap();

        assert!(seen_high, "pool never reached the spike level");
        assert!(seen_low_after_high, "pool never scaled back down");
    }
}
