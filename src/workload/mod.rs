//! Workload catalog: operation definitions, mixture weights, and the
//! two-stage weighted selector used by workers.

pub mod distribution;
pub mod registry;

pub use distribution::{Category, Complexity, WorkloadDistribution, WEIGHT_SUM_TOLERANCE};
pub use registry::{OperationDefinition, WorkloadRegistry, WorkloadRegistryBuilder};
