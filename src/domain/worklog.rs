//! Work log entries for audit and replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::{CompletionOutcome, Message, Payload};

/// Event name constants
pub mod events {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_RESUMED: &str = "run.resumed";
    pub const PLAN_CREATED: &str = "plan.created";
    pub const STATUS_CHANGE: &str = "run.status_change";
    pub const TASK_ASSIGNED: &str = "task.assigned";
    pub const PR_SUBMITTED: &str = "pr.submitted";
    pub const PR_FEEDBACK: &str = "pr.feedback";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_ESCALATED: &str = "task.escalated";
    pub const TASK_FAILED: &str = "task.failed";
    pub const AGENT_ERROR: &str = "agent.error";
    pub const BACKEND_RETRY: &str = "backend.retry";
    pub const IMPROVEMENT_REQUESTED: &str = "improvement.requested";
    pub const IMPROVEMENT_COMPLETED: &str = "improvement.completed";
    pub const RUN_COMPLETED: &str = "run.completed";
    pub const RUN_FAILED: &str = "run.failed";
}

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Agent or component that caused the event
    pub actor: String,
    /// Event name (see [`events`])
    pub event: String,
    /// Event-specific data
    pub detail: Value,
}

impl WorkLogEntry {
    pub fn new(actor: impl Into<String>, event: &str, detail: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            event: event.to_string(),
            detail,
        }
    }

    pub fn run_started(run_id: &str, requirement: &str) -> Self {
        Self::new(
            "orchestrator",
            events::RUN_STARTED,
            json!({ "run_id": run_id, "requirement": requirement }),
        )
    }

    pub fn run_resumed(run_id: &str, current_index: usize) -> Self {
        Self::new(
            "orchestrator",
            events::RUN_RESUMED,
            json!({ "run_id": run_id, "current_index": current_index }),
        )
    }

    pub fn plan_created(task_ids: &[String]) -> Self {
        Self::new(
            "planner",
            events::PLAN_CREATED,
            json!({ "tasks": task_ids }),
        )
    }

    pub fn status_change(old: &str, new: &str) -> Self {
        Self::new(
            "orchestrator",
            events::STATUS_CHANGE,
            json!({ "old_status": old, "new_status": new }),
        )
    }

    pub fn backend_retry(task_id: Option<&str>, attempt: u32, reason: &str) -> Self {
        Self::new(
            "orchestrator",
            events::BACKEND_RETRY,
            json!({ "task_id": task_id, "attempt": attempt, "reason": reason }),
        )
    }

    pub fn run_completed(escalated: usize, failed: usize) -> Self {
        Self::new(
            "orchestrator",
            events::RUN_COMPLETED,
            json!({ "escalated": escalated, "failed": failed }),
        )
    }

    pub fn run_failed(reason: &str) -> Self {
        Self::new(
            "orchestrator",
            events::RUN_FAILED,
            json!({ "reason": reason }),
        )
    }

    /// Audit record for a message seen on the bus, or None for `AGENT_READY`
    /// (which is logged as `run.completed` instead)
    pub fn for_message(message: &Message) -> Option<Self> {
        let (event, detail) = match &message.payload {
            Payload::TaskAssigned { task, .. } => (
                events::TASK_ASSIGNED,
                json!({ "task_id": task.id, "iteration": task.iteration_count }),
            ),
            Payload::PrSubmitted { task_id, artifact } => (
                events::PR_SUBMITTED,
                json!({
                    "task_id": task_id,
                    "revision": artifact.revision,
                    "reference": artifact.reference,
                    "digest": artifact.digest(),
                }),
            ),
            Payload::PrFeedback {
                task_id,
                iteration,
                score,
                feedback,
                ..
            } => (
                events::PR_FEEDBACK,
                json!({
                    "task_id": task_id,
                    "iteration": iteration,
                    "total": score.total,
                    "issues": feedback.len(),
                }),
            ),
            Payload::TaskCompleted {
                task_id,
                outcome,
                iteration,
                score,
                reason,
            } => {
                let event = match outcome {
                    CompletionOutcome::Approved => events::TASK_COMPLETED,
                    CompletionOutcome::Escalated => events::TASK_ESCALATED,
                    CompletionOutcome::Failed => events::TASK_FAILED,
                };
                (
                    event,
                    json!({
                        "task_id": task_id,
                        "iteration": iteration,
                        "total": score.as_ref().map(|s| s.total),
                        "reason": reason,
                    }),
                )
            }
            Payload::ImprovementRequested { completed_tasks, .. } => (
                events::IMPROVEMENT_REQUESTED,
                json!({ "completed_tasks": completed_tasks }),
            ),
            Payload::ImprovementCompleted { artifact } => (
                events::IMPROVEMENT_COMPLETED,
                json!({ "reference": artifact.reference, "digest": artifact.digest() }),
            ),
            Payload::AgentError {
                task_id,
                reason,
                retryable,
            } => (
                events::AGENT_ERROR,
                json!({ "task_id": task_id, "reason": reason, "retryable": retryable }),
            ),
            Payload::AgentReady { .. } => return None,
        };
        Some(Self::new(message.from_agent.clone(), event, detail))
    }

    pub fn is_task_event(&self) -> bool {
        self.event.starts_with("task.") || self.event.starts_with("pr.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = WorkLogEntry::new("executor", "custom.event", Value::Null);
        assert_eq!(entry.actor, "executor");
        assert_eq!(entry.event, "custom.event");
    }

    #[test]
    fn test_run_started() {
        let entry = WorkLogEntry::run_started("run-1", "build a parser");
        assert_eq!(entry.event, events::RUN_STARTED);
        assert_eq!(entry.detail["requirement"], "build a parser");
    }

    #[test]
    fn test_backend_retry() {
        let entry = WorkLogEntry::backend_retry(Some("task-001"), 2, "timed out");
        assert_eq!(entry.detail["attempt"], 2);
        assert_eq!(entry.detail["task_id"], "task-001");
    }

    #[test]
    fn test_is_task_event() {
        assert!(WorkLogEntry::new("planner", events::PR_FEEDBACK, Value::Null).is_task_event());
        assert!(!WorkLogEntry::run_failed("boom").is_task_event());
    }

    #[test]
    fn test_for_message() {
        let message = Message::new(
            "planner",
            "orchestrator",
            Payload::TaskCompleted {
                task_id: "task-002".to_string(),
                outcome: CompletionOutcome::Escalated,
                iteration: 3,
                score: None,
                reason: Some("iteration cap reached".to_string()),
            },
        );
        let entry = WorkLogEntry::for_message(&message).unwrap();
        assert_eq!(entry.actor, "planner");
        assert_eq!(entry.event, events::TASK_ESCALATED);
        assert_eq!(entry.detail["iteration"], 3);
        assert!(entry.is_task_event());

        let ready = Message::new(
            "planner",
            "orchestrator",
            Payload::AgentReady {
                agent: "planner".to_string(),
            },
        );
        assert!(WorkLogEntry::for_message(&ready).is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let entry = WorkLogEntry::status_change("executing", "reviewing");
        let json = serde_json::to_string(&entry).unwrap();
        let back: WorkLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
