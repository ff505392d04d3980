// Weighted review scorer
// One evaluator per criterion, aggregated into a ReviewScore

use std::collections::BTreeMap;

use log::debug;

use crate::domain::{Artifact, ReviewScore, Task};
use crate::review::criterion::{Criterion, CriterionEvaluator};
use crate::review::feedback::{Feedback, Issue};
use crate::review::heuristics::ReviewerProfile;

/// Score plus the issues behind it
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub score: ReviewScore,
    pub issues: Vec<Issue>,
}

impl ReviewOutcome {
    /// Issues deduplicated and prioritized for the executor
    pub fn feedback(&self) -> Feedback {
        Feedback::from_issues(self.issues.iter().cloned())
    }
}

/// Aggregates the five criterion evaluators.
///
/// A pure function of `(task, artifact)` given its evaluators: no clock, no
/// randomness, no I/O.
pub struct ReviewScorer {
    evaluators: BTreeMap<Criterion, Box<dyn CriterionEvaluator>>,
}

impl ReviewScorer {
    /// Scorer with the heuristic evaluators for `profile`
    pub fn new(profile: &ReviewerProfile) -> Self {
        let evaluators = profile.evaluators().into_iter().map(|e| (e.criterion(), e)).collect();
        Self { evaluators }
    }

    /// Replace the evaluator for one criterion (builder pattern)
    pub fn with_evaluator(mut self, evaluator: impl CriterionEvaluator + 'static) -> Self {
        self.evaluators.insert(evaluator.criterion(), Box::new(evaluator));
        self
    }

    /// Get descriptions of all evaluators in scoring order
    pub fn evaluator_descriptions(&self) -> Vec<&str> {
        self.evaluators.values().map(|e| e.description()).collect()
    }

    /// Score a submission and collect the issues found
    pub fn review(&self, task: &Task, artifact: &Artifact) -> ReviewOutcome {
        let mut criteria = BTreeMap::new();
        let mut issues = Vec::new();

        for criterion in Criterion::ALL {
            let points = match self.evaluators.get(&criterion) {
                Some(evaluator) => {
                    let assessment = evaluator.evaluate(task, artifact);
                    issues.extend(assessment.issues);
                    criterion.points_for(assessment.percent)
                }
                None => 0,
            };
            criteria.insert(criterion.as_str().to_string(), points);
        }

        let score = ReviewScore::from_criteria(criteria);
        debug!("Review of {}: {}", task.id, score);
        ReviewOutcome { score, issues }
    }

    pub fn score(&self, task: &Task, artifact: &Artifact) -> ReviewScore {
        self.review(task, artifact).score
    }
}

impl Default for ReviewScorer {
    fn default() -> Self {
        Self::new(&ReviewerProfile::default())
    }
}
