//! Seam between the harness and the backend under test.
//!
//! The harness never speaks a backend protocol itself: it hands an
//! [`OperationDefinition`] to an injected executor, measures the wall-clock
//! time around the call, and classifies the returned status.

use async_trait::async_trait;

use crate::workload::OperationDefinition;

/// Outcome reported by the backend executor for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Operation completed successfully
    Ok,
    /// Ordinary per-operation failure; the run continues
    Failed(String),
    /// Backend-level failure (e.g. connectivity loss); repeated fatal
    /// failures abort the run
    Fatal(String),
}

impl ExecutionStatus {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutionStatus::Fatal(_))
    }
}

/// Executes operations against the backend under test.
///
/// Implementations are shared across all workers and must be cheap to call
/// concurrently. The harness enforces the per-operation timeout; executors
/// do not need their own deadline handling.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, op: &OperationDefinition) -> ExecutionStatus;
}
