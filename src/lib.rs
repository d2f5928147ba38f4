//! loadbench - a concurrent load-testing harness.
//!
//! Drives a configurable mixture of operations against a pluggable backend
//! at a time-varying target concurrency and produces latency, throughput,
//! and error metrics. The backend is injected through
//! [`executor::OperationExecutor`]; the harness measures it and is agnostic
//! to what it does.

pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pattern;
pub mod pool;
pub mod runner;
pub mod sim;
pub mod workload;

pub use config::BenchmarkConfig;
pub use error::BenchError;
pub use executor::{ExecutionStatus, OperationExecutor};
pub use metrics::{BenchmarkResult, IntervalSnapshot, MetricsCollector, RunStatus};
pub use pattern::{target_concurrency, LoadPatternConfig, PatternKind};
pub use pool::{ConcurrencyManager, PoolConfig, PoolOutcome};
pub use runner::{BenchmarkRunner, Phase};
pub use workload::{
    Category, Complexity, OperationDefinition, WorkloadDistribution, WorkloadRegistry,
};
