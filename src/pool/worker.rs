//! Worker loop: pull an operation, execute it with a deadline, report a
//! sample, repeat until told to stop.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Notify};

use crate::executor::{ExecutionStatus, OperationExecutor};
use crate::metrics::{ErrorKind, MetricsCollector, Outcome, Sample};
use crate::workload::WorkloadRegistry;

/// Lifecycle of one worker slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Tracks consecutive backend-level failures across all workers.
///
/// A single shared streak counter: fatal outcomes increment it, any other
/// completion resets it. Crossing the threshold latches the abort flag.
pub(crate) struct FatalTracker {
    streak: AtomicU32,
    threshold: u32,
    tripped: AtomicBool,
    notify: Notify,
}

impl FatalTracker {
    /// A threshold of 0 disables aborting.
    pub fn new(threshold: u32) -> Self {
        Self {
            streak: AtomicU32::new(0),
            threshold,
            tripped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn record_fatal(&self) {
        let streak = self.streak.fetch_add(1, Ordering::SeqCst) + 1;
        if self.threshold > 0
            && streak >= self.threshold
            && !self.tripped.swap(true, Ordering::SeqCst)
        {
            self.notify.notify_one();
        }
    }

    pub fn reset_streak(&self) {
        self.streak.store(0, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once the abort latch is set.
    pub async fn tripped_wait(&self) {
        if self.is_tripped() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Shared dependencies handed to every worker.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub registry: Arc<WorkloadRegistry>,
    pub executor: Arc<dyn OperationExecutor>,
    pub collector: Arc<MetricsCollector>,
    pub fatal: Arc<FatalTracker>,
    pub op_timeout: Duration,
    pub shutdown: watch::Receiver<bool>,
}

pub(crate) async fn worker_loop(
    slot: usize,
    ctx: WorkerContext,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) {
    state.store(WorkerState::Running as u8, Ordering::SeqCst);

    loop {
        // Stop flags are only consulted between operations; an in-flight
        // executor call is never interrupted.
        if *ctx.shutdown.borrow() || stop.load(Ordering::SeqCst) {
            break;
        }

        let op = match ctx.registry.select_next() {
            Ok(op) => op,
            Err(e) => {
                tracing::error!(slot, error = %e, "worker failed to select an operation");
                break;
            }
        };

        let started_at = Utc::now();
        let begin = Instant::now();
        let outcome = match tokio::time::timeout(ctx.op_timeout, ctx.executor.execute(op)).await {
            Ok(ExecutionStatus::Ok) => Outcome::Success,
            Ok(ExecutionStatus::Failed(msg)) => Outcome::Error(ErrorKind::Operation(msg)),
            Ok(ExecutionStatus::Fatal(msg)) => Outcome::Error(ErrorKind::FatalBackend(msg)),
            Err(_) => Outcome::Error(ErrorKind::Timeout),
        };
        let latency = begin.elapsed();

        if outcome.is_fatal() {
            ctx.fatal.record_fatal();
        } else {
            ctx.fatal.reset_streak();
        }

        ctx.collector.record(
            slot,
            Sample {
                operation_id: op.id.clone(),
                started_at,
                latency,
                outcome,
            },
        );
    }

    state.store(WorkerState::Stopped as u8, Ordering::SeqCst);
}
