// Review criteria and the evaluator interface

use serde::{Deserialize, Serialize};

use crate::domain::{Artifact, Task};
use crate::review::feedback::Issue;

/// The five weighted review criteria. Weights sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Functionality,
    Testing,
    Quality,
    Documentation,
    EdgeCases,
}

impl Criterion {
    /// All criteria in scoring order
    pub const ALL: [Criterion; 5] = [
        Criterion::Functionality,
        Criterion::Testing,
        Criterion::Quality,
        Criterion::Documentation,
        Criterion::EdgeCases,
    ];

    /// Maximum points for this criterion
    pub fn weight(&self) -> u32 {
        match self {
            Criterion::Functionality => 30,
            Criterion::Testing => 25,
            Criterion::Quality => 20,
            Criterion::Documentation => 15,
            Criterion::EdgeCases => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Functionality => "functionality",
            Criterion::Testing => "testing",
            Criterion::Quality => "quality",
            Criterion::Documentation => "documentation",
            Criterion::EdgeCases => "edge_cases",
        }
    }

    /// Points earned for a percentage (clamped to 0..=100)
    pub fn points_for(&self, percent: u32) -> u32 {
        self.weight() * percent.min(100) / 100
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One evaluator's verdict on one criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Share of the criterion's weight earned, 0..=100
    pub percent: u32,
    /// Problems found, fed back to the executor on rejection
    pub issues: Vec<Issue>,
}

impl Assessment {
    /// Full marks, no issues
    pub fn full() -> Self {
        Self {
            percent: 100,
            issues: Vec::new(),
        }
    }

    pub fn new(percent: u32, issues: Vec<Issue>) -> Self {
        Self {
            percent: percent.min(100),
            issues,
        }
    }
}

/// Judges a single criterion.
///
/// Implementations must be deterministic for a given task and artifact; the
/// judgment itself (static analysis, heuristics, a cached model verdict) is up
/// to the implementation.
pub trait CriterionEvaluator: Send + Sync {
    /// Criterion this evaluator scores
    fn criterion(&self) -> Criterion;

    fn evaluate(&self, task: &Task, artifact: &Artifact) -> Assessment;

    /// Get a description of what this evaluator checks
    fn description(&self) -> &str {
        "evaluator"
    }
}
