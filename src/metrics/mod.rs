//! Metrics pipeline: per-operation samples in, interval snapshots and the
//! final benchmark result out.

pub mod collector;
pub mod report;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use collector::{IntervalSnapshot, MetricsCollector};
pub use report::{BenchmarkResult, OperationStats, ResourceUsage, RunStatus};

/// Classification of a failed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The executor reported an ordinary failure
    Operation(String),
    /// The executor exceeded the per-operation deadline
    Timeout,
    /// Backend-level failure; streaks of these abort the run
    FatalBackend(String),
}

/// Result of one executed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error(ErrorKind),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Error(ErrorKind::FatalBackend(_)))
    }
}

/// One measured operation, produced by a worker and handed to the collector.
#[derive(Debug, Clone)]
pub struct Sample {
    pub operation_id: String,
    pub started_at: DateTime<Utc>,
    pub latency: Duration,
    pub outcome: Outcome,
}

impl Sample {
    pub fn new(operation_id: impl Into<String>, latency: Duration, outcome: Outcome) -> Self {
        Self {
            operation_id: operation_id.into(),
            started_at: Utc::now(),
            latency,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert!(!Outcome::Success.is_error());
        assert!(Outcome::Error(ErrorKind::Timeout).is_error());
        assert!(!Outcome::Error(ErrorKind::Timeout).is_fatal());
        assert!(Outcome::Error(ErrorKind::FatalBackend("down".to_string())).is_fatal());
        assert!(Outcome::Error(ErrorKind::Operation("bad row".to_string())).is_error());
    }
}
