// Error handling module
// Defines the hard-failure error types of the harness

use thiserror::Error;

use crate::workload::{Category, Complexity};

/// Errors that can stop a benchmark from starting or running.
///
/// Per-operation failures (executor errors, timeouts, fatal backend errors)
/// are not represented here: they are swallowed at the worker boundary and
/// become error samples in the metrics stream.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid configuration (weights, durations, concurrency bounds)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation id was registered twice
    #[error("Duplicate operation id: {0}")]
    DuplicateOperation(String),

    /// Weighted selection repeatedly drew a cell with no registered operation
    #[error("No operation matches {category}/{complexity}")]
    NoMatchingOperation {
        category: Category,
        complexity: Complexity,
    },

    /// Worker pool failed in a way that is not a per-operation error
    #[error("Worker pool error: {0}")]
    Pool(String),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::Config("duration must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: duration must be positive"
        );

        let err = BenchError::DuplicateOperation("read_simple_1".to_string());
        assert_eq!(err.to_string(), "Duplicate operation id: read_simple_1");

        let err = BenchError::NoMatchingOperation {
            category: Category::Delete,
            complexity: Complexity::Complex,
        };
        assert_eq!(err.to_string(), "No operation matches delete/complex");
    }

    #[test]
    fn test_pool_error_message() {
        let err = BenchError::Pool("drain timed out".to_string());
        assert_eq!(err.to_string(), "Worker pool error: drain timed out");
    }
}
