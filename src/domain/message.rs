//! Messages exchanged between agents over the bus
//!
//! The message type is derived from the typed payload, so a message can never
//! claim one type and carry another type's data.

use serde::{Deserialize, Serialize};

use crate::domain::{Artifact, ReviewScore, Task};
use crate::id::{generate_message_id, now_ms};
use crate::review::Feedback;

/// The fixed message vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    TaskAssigned,
    PrSubmitted,
    PrFeedback,
    TaskCompleted,
    ImprovementRequested,
    ImprovementCompleted,
    AgentReady,
    AgentError,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::TaskAssigned => "TASK_ASSIGNED",
            MessageType::PrSubmitted => "PR_SUBMITTED",
            MessageType::PrFeedback => "PR_FEEDBACK",
            MessageType::TaskCompleted => "TASK_COMPLETED",
            MessageType::ImprovementRequested => "IMPROVEMENT_REQUESTED",
            MessageType::ImprovementCompleted => "IMPROVEMENT_COMPLETED",
            MessageType::AgentReady => "AGENT_READY",
            MessageType::AgentError => "AGENT_ERROR",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a task left the review cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Approved,
    Escalated,
    Failed,
}

/// Typed message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    /// Planner hands a task to the executor
    TaskAssigned { run_id: String, task: Task },

    /// Executor submits an artifact for review
    PrSubmitted { task_id: String, artifact: Artifact },

    /// Reviewer rejected the submission; carries the prior artifact for revision
    PrFeedback {
        task_id: String,
        iteration: u32,
        score: ReviewScore,
        feedback: Feedback,
        artifact: Artifact,
    },

    /// Task left the review cycle
    TaskCompleted {
        task_id: String,
        outcome: CompletionOutcome,
        iteration: u32,
        score: Option<ReviewScore>,
        reason: Option<String>,
    },

    /// One-shot optimization pass after every task is terminal
    ImprovementRequested {
        run_id: String,
        requirement: String,
        completed_tasks: Vec<String>,
    },

    /// Executor finished the optimization pass
    ImprovementCompleted { artifact: Artifact },

    /// The run is done from this agent's point of view
    AgentReady { agent: String },

    /// Something failed; `task_id` is None for the improvement pass
    AgentError {
        task_id: Option<String>,
        reason: String,
        retryable: bool,
    },
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::TaskAssigned { .. } => MessageType::TaskAssigned,
            Payload::PrSubmitted { .. } => MessageType::PrSubmitted,
            Payload::PrFeedback { .. } => MessageType::PrFeedback,
            Payload::TaskCompleted { .. } => MessageType::TaskCompleted,
            Payload::ImprovementRequested { .. } => MessageType::ImprovementRequested,
            Payload::ImprovementCompleted { .. } => MessageType::ImprovementCompleted,
            Payload::AgentReady { .. } => MessageType::AgentReady,
            Payload::AgentError { .. } => MessageType::AgentError,
        }
    }

    /// Task this payload refers to, where applicable
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Payload::TaskAssigned { task, .. } => Some(&task.id),
            Payload::PrSubmitted { task_id, .. }
            | Payload::PrFeedback { task_id, .. }
            | Payload::TaskCompleted { task_id, .. } => Some(task_id),
            Payload::AgentError { task_id, .. } => task_id.as_deref(),
            Payload::ImprovementCompleted { artifact } => artifact.task_id.as_deref(),
            Payload::ImprovementRequested { .. } | Payload::AgentReady { .. } => None,
        }
    }
}

/// An immutable envelope routed by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub payload: Payload,
    /// Unix ms
    pub created_at: i64,
}

impl Message {
    pub fn new(from: impl Into<String>, to: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: generate_message_id(),
            from_agent: from.into(),
            to_agent: to.into(),
            payload,
            created_at: now_ms(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.payload.task_id()
    }

    /// Same payload and receiver under a new id and sender (used for redelivery)
    pub fn resend_from(&self, from: impl Into<String>) -> Self {
        Self::new(from, self.to_agent.clone(), self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> Message {
        Message::new(
            "planner",
            "orchestrator",
            Payload::AgentReady {
                agent: "planner".to_string(),
            },
        )
    }

    #[test]
    fn test_message_type_derived_from_payload() {
        assert_eq!(ready().message_type(), MessageType::AgentReady);

        let err = Payload::AgentError {
            task_id: Some("task-001".to_string()),
            reason: "timeout".to_string(),
            retryable: true,
        };
        assert_eq!(err.message_type(), MessageType::AgentError);
        assert_eq!(err.task_id(), Some("task-001"));
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let json = serde_json::to_value(&ready().payload).unwrap();
        assert_eq!(json["type"], "AGENT_READY");
        assert_eq!(json["agent"], "planner");
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(MessageType::PrFeedback.to_string(), "PR_FEEDBACK");
        assert_eq!(
            serde_json::to_string(&MessageType::ImprovementRequested).unwrap(),
            "\"IMPROVEMENT_REQUESTED\""
        );
    }

    #[test]
    fn test_resend_keeps_payload_and_receiver() {
        let original = ready();
        let resent = original.resend_from("orchestrator");
        assert_ne!(resent.id, original.id);
        assert_eq!(resent.from_agent, "orchestrator");
        assert_eq!(resent.to_agent, original.to_agent);
        assert_eq!(resent.payload, original.payload);
    }

    #[test]
    fn test_improvement_payload_has_no_task() {
        let payload = Payload::ImprovementRequested {
            run_id: "run-1".to_string(),
            requirement: "build it".to_string(),
            completed_tasks: vec![],
        };
        assert!(payload.task_id().is_none());
    }
}
