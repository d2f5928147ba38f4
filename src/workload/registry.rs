//! Operation catalog with two-stage weighted selection.
//!
//! Selection draws a category, then a complexity tier, each according to the
//! configured weights, then picks uniformly among operations matching both.
//! This lets a flat catalog reproduce arbitrary cross-tabulated proportions
//! without enumerating a weight for every (category, complexity) cell.

use std::collections::{HashMap, HashSet};

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{Category, Complexity, WorkloadDistribution};
use crate::error::{BenchError, Result};

/// Redraws allowed before giving up on a zero-coverage cell
const MAX_DRAW_RETRIES: usize = 8;

/// A single benchmark operation. Immutable once registered; execution is
/// performed by the injected [`crate::executor::OperationExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition {
    pub id: String,
    pub category: Category,
    pub complexity: Complexity,
}

impl OperationDefinition {
    pub fn new(id: impl Into<String>, category: Category, complexity: Complexity) -> Self {
        Self {
            id: id.into(),
            category,
            complexity,
        }
    }
}

/// Collects operations before the registry is frozen for the run.
pub struct WorkloadRegistryBuilder {
    distribution: WorkloadDistribution,
    operations: Vec<OperationDefinition>,
    ids: HashSet<String>,
}

impl WorkloadRegistryBuilder {
    /// Register an operation, rejecting duplicate ids.
    pub fn register(&mut self, op: OperationDefinition) -> Result<()> {
        if !self.ids.insert(op.id.clone()) {
            return Err(BenchError::DuplicateOperation(op.id));
        }
        self.operations.push(op);
        Ok(())
    }

    /// Freeze the catalog. Validates the distribution invariants and that
    /// every (category, complexity) cell with positive weight on both axes
    /// has at least one registered operation.
    pub fn build(self) -> Result<WorkloadRegistry> {
        self.distribution.validate()?;

        if self.operations.is_empty() {
            return Err(BenchError::Config(
                "workload registry has no operations".to_string(),
            ));
        }

        let mut by_cell: HashMap<(Category, Complexity), Vec<usize>> = HashMap::new();
        for (idx, op) in self.operations.iter().enumerate() {
            by_cell
                .entry((op.category, op.complexity))
                .or_default()
                .push(idx);
        }

        for category in Category::ALL {
            for complexity in Complexity::ALL {
                let reachable = self.distribution.category_weight(category) > 0.0
                    && self.distribution.complexity_weight(complexity) > 0.0;
                if reachable && !by_cell.contains_key(&(category, complexity)) {
                    return Err(BenchError::Config(format!(
                        "no operation registered for weighted cell {}/{}",
                        category, complexity
                    )));
                }
            }
        }

        let (category_choices, category_weights): (Vec<_>, Vec<_>) =
            self.distribution.categories.iter().copied().unzip();
        let (complexity_choices, complexity_weights): (Vec<_>, Vec<_>) =
            self.distribution.complexities.iter().copied().unzip();

        let category_index = WeightedIndex::new(&category_weights)
            .map_err(|e| BenchError::Config(format!("invalid category weights: {}", e)))?;
        let complexity_index = WeightedIndex::new(&complexity_weights)
            .map_err(|e| BenchError::Config(format!("invalid complexity weights: {}", e)))?;

        Ok(WorkloadRegistry {
            operations: self.operations,
            by_cell,
            category_choices,
            category_index,
            complexity_choices,
            complexity_index,
        })
    }
}

/// Frozen operation catalog. Read-only after construction, shared across
/// workers without locking.
pub struct WorkloadRegistry {
    operations: Vec<OperationDefinition>,
    by_cell: HashMap<(Category, Complexity), Vec<usize>>,
    category_choices: Vec<Category>,
    category_index: WeightedIndex<f64>,
    complexity_choices: Vec<Complexity>,
    complexity_index: WeightedIndex<f64>,
}

impl WorkloadRegistry {
    pub fn builder(distribution: WorkloadDistribution) -> WorkloadRegistryBuilder {
        WorkloadRegistryBuilder {
            distribution,
            operations: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Number of registered operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// Draw the next operation to execute.
    ///
    /// Cells left empty by the catalog are redrawn up to a bounded number of
    /// times; build-time coverage validation makes exhaustion unreachable in
    /// practice.
    pub fn select_next(&self) -> Result<&OperationDefinition> {
        let mut rng = rand::thread_rng();
        let mut last_draw = None;

        for _ in 0..MAX_DRAW_RETRIES {
            let category = self.category_choices[self.category_index.sample(&mut rng)];
            let complexity = self.complexity_choices[self.complexity_index.sample(&mut rng)];

            if let Some(cell) = self.by_cell.get(&(category, complexity)) {
                let idx = cell[rng.gen_range(0..cell.len())];
                return Ok(&self.operations[idx]);
            }
            last_draw = Some((category, complexity));
        }

        let (category, complexity) = last_draw.expect("at least one draw was made");
        Err(BenchError::NoMatchingOperation {
            category,
            complexity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_catalog(distribution: WorkloadDistribution) -> WorkloadRegistry {
        let mut builder = WorkloadRegistry::builder(distribution);
        for category in Category::ALL {
            for complexity in Complexity::ALL {
                builder
                    .register(OperationDefinition::new(
                        format!("{}_{}", category, complexity),
                        category,
                        complexity,
                    ))
                    .unwrap();
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut builder = WorkloadRegistry::builder(WorkloadDistribution::default());
        builder
            .register(OperationDefinition::new(
                "op_a",
                Category::Read,
                Complexity::Simple,
            ))
            .unwrap();
        let err = builder
            .register(OperationDefinition::new(
                "op_a",
                Category::Write,
                Complexity::Medium,
            ))
            .unwrap_err();
        assert!(matches!(err, BenchError::DuplicateOperation(id) if id == "op_a"));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let result = WorkloadRegistry::builder(WorkloadDistribution::default()).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_weighted_cell_rejected() {
        // Every cell is reachable under the default distribution, so a
        // catalog with only read operations must fail coverage validation.
        let mut builder = WorkloadRegistry::builder(WorkloadDistribution::default());
        for complexity in Complexity::ALL {
            builder
                .register(OperationDefinition::new(
                    format!("read_{}", complexity),
                    Category::Read,
                    complexity,
                ))
                .unwrap();
        }
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_zero_weight_cell_may_be_empty() {
        let distribution = WorkloadDistribution {
            categories: vec![(Category::Read, 1.0), (Category::Delete, 0.0)],
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
        let registry = builder.build().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.select_next().unwrap().id, "read_simple");
    }

    #[test]
    fn test_selection_matches_configured_proportions() {
        let distribution = WorkloadDistribution {
            categories: vec![(Category::Read, 0.6), (Category::Write, 0.4)],
            complexities: vec![
                (Complexity::Simple, 0.5),
                (Complexity::Medium, 0.3),
                (Complexity::Complex, 0.2),
            ],
        };
        let mut builder = WorkloadRegistry::builder(distribution.clone());
        for category in [Category::Read, Category::Write] {
            for complexity in Complexity::ALL {
                builder
                    .register(OperationDefinition::new(
                        format!("{}_{}", category, complexity),
                        category,
                        complexity,
                    ))
                    .unwrap();
            }
        }
        let registry = builder.build().unwrap();

        const DRAWS: usize = 100_000;
        let mut category_counts: HashMap<Category, usize> = HashMap::new();
        let mut complexity_counts: HashMap<Complexity, usize> = HashMap::new();
        for _ in 0..DRAWS {
            let op = registry.select_next().unwrap();
            *category_counts.entry(op.category).or_default() += 1;
            *complexity_counts.entry(op.complexity).or_default() += 1;
        }

        for (category, expected) in &distribution.categories {
            let observed = category_counts[category] as f64 / DRAWS as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "category {} observed {:.4}, expected {:.4}",
                category,
                observed,
                expected
            );
        }
        for (complexity, expected) in &distribution.complexities {
            let observed = complexity_counts[complexity] as f64 / DRAWS as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "complexity {} observed {:.4}, expected {:.4}",
                complexity,
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_uniform_choice_within_cell() {
        let distribution = WorkloadDistribution {
            categories: vec![(Category::Read, 1.0)],
            complexities: vec![(Complexity::Simple, 1.0)],
        };
        let mut builder = WorkloadRegistry::builder(distribution);
        for i in 0..4 {
            builder
                .register(OperationDefinition::new(
                    format!("read_simple_{}", i),
                    Category::Read,
                    Complexity::Simple,
                ))
                .unwrap();
        }
        let registry = builder.build().unwrap();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..20_000 {
            let op = registry.select_next().unwrap();
            *counts.entry(op.id.clone()).or_default() += 1;
        }
        for (_, count) in counts {
            let share = count as f64 / 20_000.0;
            assert!((share - 0.25).abs() < 0.03);
        }
    }

    #[test]
    fn test_full_catalog_always_selects() {
        let registry = full_catalog(WorkloadDistribution::default());
        for _ in 0..1_000 {
            assert!(registry.select_next().is_ok());
        }
    }
}
