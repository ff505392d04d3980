//! Project state aggregate and run summary

use serde::{Deserialize, Serialize};

use crate::domain::{ReviewScore, Task, TaskStatus};
use crate::error::{Result, TandemError};
use crate::id::now_ms;

/// Status of the run as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Initializing,
    Decomposing,
    Executing,
    Reviewing,
    Revising,
    Improving,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether the orchestrator may move from `self` to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::{Completed, Decomposing, Executing, Failed, Improving, Initializing, Reviewing, Revising};

        if *self == next {
            return !self.is_terminal();
        }
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Initializing, Decomposing) => true,
            (Decomposing, Executing) => true,
            (Executing, Reviewing | Improving | Completed) => true,
            (Reviewing, Revising | Executing | Improving | Completed) => true,
            (Revising, Reviewing | Executing | Improving) => true,
            (Improving, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Initializing => "initializing",
            RunStatus::Decomposing => "decomposing",
            RunStatus::Executing => "executing",
            RunStatus::Reviewing => "reviewing",
            RunStatus::Revising => "revising",
            RunStatus::Improving => "improving",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate root persisted after every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub run_id: String,
    pub requirement: String,
    /// Ordered plan
    pub tasks: Vec<Task>,
    /// Index of the task currently being worked on
    pub current_index: usize,
    pub status: RunStatus,
    /// One-shot: set once the improvement phase has been requested
    pub improvement_requested: bool,
    /// Review handle of the improvement pass, once done
    #[serde(default)]
    pub improvement_artifact: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProjectState {
    pub fn new(run_id: impl Into<String>, requirement: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            run_id: run_id.into(),
            requirement: requirement.into(),
            tasks: Vec::new(),
            current_index: 0,
            status: RunStatus::Initializing,
            improvement_requested: false,
            improvement_artifact: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the run to a new status, rejecting illegal transitions
    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TandemError::InvalidState(format!(
                "cannot move run {} from {} to {}",
                self.run_id, self.status, next
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Move to `failed` with a reason (no-op once terminal)
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RunStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }

    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_index)
    }

    /// Prepare a reloaded snapshot for resumption.
    ///
    /// Non-terminal tasks go back to `pending`, keeping their iteration count
    /// and score history, and the run returns to `executing`.
    pub fn reset_for_resume(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(TandemError::InvalidState(format!(
                "run {} is already {}",
                self.run_id, self.status
            )));
        }
        if self.tasks.is_empty() {
            return Err(TandemError::InvalidState(format!(
                "run {} has no plan to resume",
                self.run_id
            )));
        }
        for task in self.tasks.iter_mut().filter(|t| !t.is_terminal()) {
            task.status = TaskStatus::Pending;
        }
        if let Some(next) = self.tasks.iter().position(|t| !t.is_terminal()) {
            self.current_index = next;
        }
        self.status = RunStatus::Executing;
        self.touch();
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let outcome = |task: &Task| TaskOutcome {
            task_id: task.id.clone(),
            description: task.description.clone(),
            status: task.status,
            iteration_count: task.iteration_count,
            final_score: task.latest_score().cloned(),
            reason: task.failure_reason.clone(),
        };
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            completed: self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .map(outcome)
                .collect(),
            escalated: self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Escalated)
                .map(outcome)
                .collect(),
            failed: self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .map(outcome)
                .collect(),
            improvement_artifact: self.improvement_artifact.clone(),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Per-task line of a run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub iteration_count: u32,
    pub final_score: Option<ReviewScore>,
    pub reason: Option<String>,
}

/// What a finished (or failed) run reports to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub completed: Vec<TaskOutcome>,
    pub escalated: Vec<TaskOutcome>,
    pub failed: Vec<TaskOutcome>,
    pub improvement_artifact: Option<String>,
    pub failure_reason: Option<String>,
}

impl RunSummary {
    /// Tasks an operator has to look at
    pub fn needs_attention(&self) -> bool {
        !self.escalated.is_empty() || !self.failed.is_empty()
    }
}
