//! Task record and its review transitions
//!
//! A Task is one decomposed unit of work. The planner works on a local copy and
//! the orchestrator mirrors every change into the persisted project state; both
//! go through [`Task::record_review`] so the iteration cap is enforced in one place.

use serde::{Deserialize, Serialize};

use crate::domain::ReviewScore;
use crate::id::generate_task_id;

/// Maximum feedback/resubmit cycles per task before escalation
pub const MAX_ITERATIONS: u32 = 3;

/// A single unit of work with acceptance criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier ("task-001")
    pub id: String,

    /// What needs to be built
    pub description: String,

    /// Conditions a submission must meet (never empty)
    pub acceptance_criteria: Vec<String>,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Number of rejected reviews so far (never exceeds MAX_ITERATIONS)
    pub iteration_count: u32,

    /// Backend that produces this task's artifacts
    pub assigned_backend: String,

    /// Every score this task received, oldest first
    #[serde(default)]
    pub scores: Vec<ReviewScore>,

    /// Review handle of the most recent submission
    #[serde(default)]
    pub last_artifact: Option<String>,

    /// Why the task failed, if it did
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet assigned (or reset after a crash)
    Pending,
    /// Assigned to the executor, generation in flight
    InProgress,
    /// Submitted and waiting for a score
    InReview,
    /// Rejected, executor is revising
    Revising,
    /// Approved by the reviewer
    Completed,
    /// Iteration cap reached without approval
    Escalated,
    /// Backend kept failing after retries
    Failed,
}

impl TaskStatus {
    /// Returns true if the task will not change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Escalated | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Revising => "revising",
            TaskStatus::Completed => "completed",
            TaskStatus::Escalated => "escalated",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to a task after a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Score met the threshold
    Approved,
    /// Rejected, another attempt is allowed
    Revise { iteration: u32 },
    /// Rejected at the cap
    Escalate,
}

impl Task {
    /// Create a pending task at the given plan position
    pub fn new(
        index: usize,
        description: impl Into<String>,
        acceptance_criteria: Vec<String>,
        assigned_backend: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_task_id(index),
            description: description.into(),
            acceptance_criteria,
            status: TaskStatus::Pending,
            iteration_count: 0,
            assigned_backend: assigned_backend.into(),
            scores: Vec::new(),
            last_artifact: None,
            failure_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a review score.
    ///
    /// `cap` is clamped to [`MAX_ITERATIONS`]. A rejection increments the
    /// iteration count; reaching the cap escalates the task.
    pub fn record_review(&mut self, score: ReviewScore, cap: u32) -> ReviewDecision {
        let cap = cap.clamp(1, MAX_ITERATIONS);
        let approved = score.approved;
        self.scores.push(score);

        if approved {
            self.status = TaskStatus::Completed;
            return ReviewDecision::Approved;
        }

        self.iteration_count = (self.iteration_count + 1).min(cap);
        if self.iteration_count >= cap {
            self.status = TaskStatus::Escalated;
            ReviewDecision::Escalate
        } else {
            self.status = TaskStatus::Revising;
            ReviewDecision::Revise {
                iteration: self.iteration_count,
            }
        }
    }

    /// Mark the task failed with a reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Most recent score, if any
    pub fn latest_score(&self) -> Option<&ReviewScore> {
        self.scores.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn score(total: u32) -> ReviewScore {
        let mut criteria = BTreeMap::new();
        criteria.insert("functionality".to_string(), total);
        ReviewScore::from_criteria(criteria)
    }

    fn task() -> Task {
        Task::new(0, "Add login", vec!["login works".to_string()], "template")
    }

    #[test]
    fn test_new_task_is_pending() {
        let t = task();
        assert_eq!(t.id, "task-001");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.iteration_count, 0);
        assert!(t.scores.is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Escalated.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::InReview.is_terminal());
        assert!(!TaskStatus::Revising.is_terminal());
    }

    #[test]
    fn test_approval_keeps_iteration_count() {
        let mut t = task();
        assert_eq!(t.record_review(score(85), MAX_ITERATIONS), ReviewDecision::Approved);
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.iteration_count, 0);
        assert_eq!(t.scores.len(), 1);
    }

    #[test]
    fn test_rejections_escalate_at_cap() {
        let mut t = task();
        assert_eq!(
            t.record_review(score(60), MAX_ITERATIONS),
            ReviewDecision::Revise { iteration: 1 }
        );
        assert_eq!(
            t.record_review(score(60), MAX_ITERATIONS),
            ReviewDecision::Revise { iteration: 2 }
        );
        assert_eq!(t.record_review(score(60), MAX_ITERATIONS), ReviewDecision::Escalate);
        assert_eq!(t.status, TaskStatus::Escalated);
        assert_eq!(t.iteration_count, MAX_ITERATIONS);
    }

    #[test]
    fn test_iteration_count_never_exceeds_cap() {
        let mut t = task();
        for _ in 0..10 {
            t.record_review(score(10), MAX_ITERATIONS);
            assert!(t.iteration_count <= MAX_ITERATIONS);
        }
    }

    #[test]
    fn test_cap_is_clamped_to_max_iterations() {
        let mut t = task();
        for _ in 0..5 {
            t.record_review(score(10), 99);
        }
        assert_eq!(t.iteration_count, MAX_ITERATIONS);
    }

    #[test]
    fn test_fail_records_reason() {
        let mut t = task();
        t.fail("backend timed out");
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.failure_reason.as_deref(), Some("backend timed out"));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InReview).unwrap(),
            "\"in_review\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"escalated\"").unwrap(),
            TaskStatus::Escalated
        );
    }
}
