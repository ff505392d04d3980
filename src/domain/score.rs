//! Review score record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Minimum total for a submission to be approved
pub const APPROVAL_THRESHOLD: u32 = 80;

/// Weighted score for one submission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScore {
    /// Points earned per criterion name
    pub criteria: BTreeMap<String, u32>,
    /// Sum of all criterion points
    pub total: u32,
    /// `total >= APPROVAL_THRESHOLD`
    pub approved: bool,
}

impl ReviewScore {
    /// Build a score from per-criterion points
    pub fn from_criteria(criteria: BTreeMap<String, u32>) -> Self {
        let total = criteria.values().sum();
        Self {
            criteria,
            total,
            approved: total >= APPROVAL_THRESHOLD,
        }
    }

    /// Points for a single criterion
    pub fn points(&self, criterion: &str) -> Option<u32> {
        self.criteria.get(criterion).copied()
    }
}

impl std::fmt::Display for ReviewScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/100 ({})",
            self.total,
            if self.approved { "approved" } else { "rejected" }
        )
    }
}
