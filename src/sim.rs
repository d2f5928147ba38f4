//! Simulated backend for standalone runs and tests: configurable latency per
//! complexity tier plus probabilistic failure injection.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::executor::{ExecutionStatus, OperationExecutor};
use crate::workload::{Category, Complexity, OperationDefinition};

/// Tuning for the simulated backend
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub simple_latency_ms: u64,
    pub medium_latency_ms: u64,
    pub complex_latency_ms: u64,
    /// Uniform jitter added on top of the base latency
    pub jitter_ms: u64,
    /// Failure probability (0.0 to 1.0)
    pub error_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simple_latency_ms: 2,
            medium_latency_ms: 8,
            complex_latency_ms: 25,
            jitter_ms: 2,
            error_rate: 0.0,
        }
    }
}

impl SimulatorConfig {
    /// Derive the three tiers from one base latency.
    pub fn scaled(base_ms: u64, jitter_ms: u64, error_rate: f64) -> Self {
        Self {
            simple_latency_ms: base_ms,
            medium_latency_ms: base_ms * 4,
            complex_latency_ms: base_ms * 12,
            jitter_ms,
            error_rate,
        }
    }
}

/// In-process stand-in for a real backend.
pub struct SimulatedBackend {
    config: SimulatorConfig,
}

impl SimulatedBackend {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OperationExecutor for SimulatedBackend {
    async fn execute(&self, op: &OperationDefinition) -> ExecutionStatus {
        let base = match op.complexity {
            Complexity::Simple => self.config.simple_latency_ms,
            Complexity::Medium => self.config.medium_latency_ms,
            Complexity::Complex => self.config.complex_latency_ms,
        };
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };

        tokio::time::sleep(Duration::from_millis(base + jitter)).await;

        if self.config.error_rate > 0.0 {
            let roll: f64 = rand::thread_rng().gen();
            if roll < self.config.error_rate {
                return ExecutionStatus::Failed(format!("simulated failure in {}", op.id));
            }
        }
        ExecutionStatus::Ok
    }
}

/// Default TPC-C flavored operation catalog covering every
/// (category, complexity) cell.
pub fn sample_catalog() -> Vec<OperationDefinition> {
    use Category::*;
    use Complexity::*;

    vec![
        OperationDefinition::new("warehouse_lookup", Read, Simple),
        OperationDefinition::new("item_price_lookup", Read, Simple),
        OperationDefinition::new("order_status_scan", Read, Medium),
        OperationDefinition::new("stock_level_join", Read, Complex),
        OperationDefinition::new("order_line_insert", Write, Simple),
        OperationDefinition::new("new_order_insert", Write, Medium),
        OperationDefinition::new("bulk_history_insert", Write, Complex),
        OperationDefinition::new("customer_balance_update", Update, Simple),
        OperationDefinition::new("stock_quantity_update", Update, Medium),
        OperationDefinition::new("district_ytd_rollup", Update, Complex),
        OperationDefinition::new("new_order_delete", Delete, Simple),
        OperationDefinition::new("expired_session_purge", Delete, Medium),
        OperationDefinition::new("order_archive_sweep", Delete, Complex),
    ]
}
