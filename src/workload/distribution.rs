//! Workload mixture configuration: category and complexity weight maps.

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Allowed drift when checking that a weight family sums to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Operation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Read,
    Write,
    Update,
    Delete,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Read,
        Category::Write,
        Category::Update,
        Category::Delete,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Read => write!(f, "read"),
            Category::Write => write!(f, "write"),
            Category::Update => write!(f, "update"),
            Category::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Category::Read),
            "write" => Ok(Category::Write),
            "update" => Ok(Category::Update),
            "delete" => Ok(Category::Delete),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Operation complexity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Simple, Complexity::Medium, Complexity::Complex];
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "medium" => Ok(Complexity::Medium),
            "complex" => Ok(Complexity::Complex),
            _ => Err(format!("Unknown complexity: {}", s)),
        }
    }
}

/// Target mixture of the workload: per-category and per-complexity weights.
///
/// Each weight family must sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`]; the
/// two families combine multiplicatively during selection, so a flat catalog
/// can reproduce arbitrary cross-tabulated proportions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadDistribution {
    pub categories: Vec<(Category, f64)>,
    pub complexities: Vec<(Complexity, f64)>,
}

impl Default for WorkloadDistribution {
    fn default() -> Self {
        // OLTP-flavored mix: read-heavy with a thin tail of destructive ops
        Self {
            categories: vec![
                (Category::Read, 0.60),
                (Category::Write, 0.20),
                (Category::Update, 0.15),
                (Category::Delete, 0.05),
            ],
            complexities: vec![
                (Complexity::Simple, 0.50),
                (Complexity::Medium, 0.30),
                (Complexity::Complex, 0.20),
            ],
        }
    }
}

impl WorkloadDistribution {
    /// Validate weight invariants: non-negative, each family sums to 1.0
    /// within tolerance, no duplicate keys.
    pub fn validate(&self) -> Result<(), BenchError> {
        check_family("category", &self.categories)?;
        check_family("complexity", &self.complexities)?;
        Ok(())
    }

    /// Weight of a single category (0.0 if absent)
    pub fn category_weight(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    /// Weight of a single complexity tier (0.0 if absent)
    pub fn complexity_weight(&self, complexity: Complexity) -> f64 {
        self.complexities
            .iter()
            .find(|(c, _)| *c == complexity)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

fn check_family<K: std::fmt::Display + PartialEq>(
    name: &str,
    weights: &[(K, f64)],
) -> Result<(), BenchError> {
    if weights.is_empty() {
        return Err(BenchError::Config(format!("{} weights are empty", name)));
    }

    for (i, (key, weight)) in weights.iter().enumerate() {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(BenchError::Config(format!(
                "{} weight for '{}' must be a non-negative number, got {}",
                name, key, weight
            )));
        }
        if weights[..i].iter().any(|(k, _)| k == key) {
            return Err(BenchError::Config(format!(
                "duplicate {} weight for '{}'",
                name, key
            )));
        }
    }

    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(BenchError::Config(format!(
            "{} weights must sum to 1.0 (got {:.4})",
            name, sum
        )));
    }

    Ok(())
}
