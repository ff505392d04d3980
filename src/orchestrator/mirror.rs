//! Applies observed bus traffic to the persisted run state.
//!
//! The orchestrator never decides anything about tasks itself. It replays what
//! the agents say onto its own [`ProjectState`], saves a snapshot and appends
//! to the work log after every message, and handles backend retries.

use log::{debug, info, warn};

use crate::agents::{EXECUTOR, ORCHESTRATOR, PLANNER};
use crate::domain::{
    CompletionOutcome, Message, Payload, ProjectState, ReviewScore, RunStatus, TaskStatus, WorkLogEntry,
};
use crate::error::Result;
use crate::storage::{RunStore, WorkLog};

/// What the driver should do after a message was applied
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Keep listening
    Continue,
    /// Put this message on the bus
    Publish(Message),
    /// The run reached a terminal state
    Finished,
}

pub struct RunMirror {
    state: ProjectState,
    log: WorkLog,
    store: RunStore,
    max_iterations: u32,
    max_backend_retries: u32,
    /// Last command sent to the executor, re-sent on a retryable error
    last_command: Option<Message>,
    /// Failed attempts of `last_command`
    attempts: u32,
}

impl RunMirror {
    pub fn new(state: ProjectState, log: WorkLog, store: RunStore, max_iterations: u32, max_backend_retries: u32) -> Self {
        Self {
            state,
            log,
            store,
            max_iterations,
            max_backend_retries,
            last_command: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn into_state(self) -> ProjectState {
        self.state
    }

    /// Mirror one message. Errors are persistence failures and are fatal.
    pub fn apply(&mut self, message: &Message) -> Result<Step> {
        // resends and forwards of our own
        if message.from_agent == ORCHESTRATOR {
            return Ok(Step::Continue);
        }
        debug!(
            "Orchestrator: {} {} -> {}",
            message.message_type(),
            message.from_agent,
            message.to_agent
        );

        if let Some(entry) = WorkLogEntry::for_message(message) {
            self.log.append(entry)?;
        }

        let step = match &message.payload {
            Payload::TaskAssigned { task, .. } => {
                self.command(message);
                match self.state.position(&task.id) {
                    Some(pos) => {
                        self.state.tasks[pos].status = TaskStatus::InProgress;
                        self.state.current_index = pos;
                    }
                    None => warn!("Orchestrator: assignment for unknown task {}", task.id),
                }
                self.move_to(RunStatus::Executing)?;
                Step::Continue
            }
            Payload::PrSubmitted { task_id, artifact } => {
                if let Some(task) = self.state.task_mut(task_id) {
                    task.status = TaskStatus::InReview;
                    task.last_artifact = Some(artifact.reference.clone());
                }
                self.move_to(RunStatus::Reviewing)?;
                Step::Continue
            }
            Payload::PrFeedback { task_id, score, .. } => {
                self.command(message);
                let cap = self.max_iterations;
                if let Some(task) = self.state.task_mut(task_id) {
                    task.record_review(score.clone(), cap);
                }
                self.move_to(RunStatus::Revising)?;
                Step::Continue
            }
            Payload::TaskCompleted {
                task_id,
                outcome,
                iteration,
                score,
                reason,
            } => {
                self.settle(task_id, *outcome, *iteration, score.clone(), reason.clone());
                Step::Continue
            }
            Payload::ImprovementRequested { .. } => {
                self.command(message);
                self.state.improvement_requested = true;
                self.move_to(RunStatus::Improving)?;
                Step::Continue
            }
            Payload::ImprovementCompleted { artifact } => {
                self.state.improvement_artifact = Some(artifact.reference.clone());
                Step::Continue
            }
            Payload::AgentReady { agent } => {
                info!("Orchestrator: {} is ready, completing {}", agent, self.state.run_id);
                self.move_to(RunStatus::Completed)?;
                let summary = self.state.summary();
                self.log
                    .append(WorkLogEntry::run_completed(summary.escalated.len(), summary.failed.len()))?;
                Step::Finished
            }
            Payload::AgentError {
                task_id,
                reason,
                retryable,
            } => {
                if message.from_agent == EXECUTOR {
                    self.on_error(task_id.clone(), reason, *retryable)?
                } else {
                    warn!("Orchestrator: dropping error from {}: {}", message.from_agent, reason);
                    Step::Continue
                }
            }
        };

        self.state.touch();
        self.store.save(&self.state)?;
        Ok(step)
    }

    /// Fail the run because the wall-clock budget ran out
    pub fn expire(&mut self, budget_secs: u64) -> Result<()> {
        let reason = format!("wall-clock budget of {}s exceeded", budget_secs);
        warn!("Orchestrator: {} {}", self.state.run_id, reason);
        self.halt(&reason)
    }

    /// Fail the run with a reason and persist the final snapshot
    pub fn halt(&mut self, reason: &str) -> Result<()> {
        self.state.fail(reason);
        self.store.save(&self.state)?;
        self.log.append(WorkLogEntry::run_failed(reason))
    }

    fn command(&mut self, message: &Message) {
        self.last_command = Some(message.clone());
        self.attempts = 0;
    }

    fn settle(
        &mut self,
        task_id: &str,
        outcome: CompletionOutcome,
        iteration: u32,
        score: Option<ReviewScore>,
        reason: Option<String>,
    ) {
        let Some(pos) = self.state.position(task_id) else {
            warn!("Orchestrator: completion for unknown task {}", task_id);
            return;
        };
        let cap = self.max_iterations;
        let task = &mut self.state.tasks[pos];
        match outcome {
            CompletionOutcome::Approved | CompletionOutcome::Escalated => {
                if let Some(score) = score {
                    task.record_review(score, cap);
                }
                task.status = match outcome {
                    CompletionOutcome::Approved => TaskStatus::Completed,
                    _ => TaskStatus::Escalated,
                };
                if outcome == CompletionOutcome::Escalated {
                    warn!(
                        "Orchestrator: {} escalated after {} iterations, needs attention",
                        task_id, task.iteration_count
                    );
                }
            }
            CompletionOutcome::Failed => {
                task.fail(reason.unwrap_or_else(|| "backend failure".to_string()));
                warn!("Orchestrator: {} failed", task_id);
            }
        }
        if task.iteration_count != iteration {
            debug!(
                "Orchestrator: {} iteration {} differs from reported {}",
                task_id, task.iteration_count, iteration
            );
        }
        self.state.current_index = pos + 1;
    }

    fn on_error(&mut self, task_id: Option<String>, reason: &str, retryable: bool) -> Result<Step> {
        self.attempts += 1;
        if retryable && self.attempts <= self.max_backend_retries {
            if let Some(command) = &self.last_command {
                info!(
                    "Orchestrator: retrying {} ({}/{}): {}",
                    command.message_type(),
                    self.attempts,
                    self.max_backend_retries,
                    reason
                );
                let resend = command.resend_from(ORCHESTRATOR);
                self.log
                    .append(WorkLogEntry::backend_retry(task_id.as_deref(), self.attempts, reason))?;
                return Ok(Step::Publish(resend));
            }
        }

        warn!(
            "Orchestrator: giving up on {} after {} attempts: {}",
            task_id.as_deref().unwrap_or("improvement"),
            self.attempts,
            reason
        );
        Ok(Step::Publish(Message::new(
            ORCHESTRATOR,
            PLANNER,
            Payload::AgentError {
                task_id,
                reason: reason.to_string(),
                retryable: false,
            },
        )))
    }

    /// Follow the agents into `next`; an illegal move is logged, not fatal
    fn move_to(&mut self, next: RunStatus) -> Result<()> {
        let old = self.state.status;
        if old == next {
            return Ok(());
        }
        match self.state.transition(next) {
            Ok(()) => self
                .log
                .append(WorkLogEntry::status_change(old.as_str(), next.as_str())),
            Err(e) => {
                warn!("Orchestrator: {}", e);
                Ok(())
            }
        }
    }
}
