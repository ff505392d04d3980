//! Execution agent.
//!
//! Turns assignments into submitted artifacts:
//!
//! 1. `TASK_ASSIGNED`: fresh generation
//! 2. `PR_FEEDBACK`: revision of the prior artifact using the feedback
//! 3. `IMPROVEMENT_REQUESTED`: one optimization pass over the whole run
//!
//! Every backend call is bounded by a timeout. On any failure the agent
//! reports `AGENT_ERROR` to the orchestrator and waits; it never retries on
//! its own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::agents::{EXECUTOR, ORCHESTRATOR, PLANNER};
use crate::backend::{Backend, BackendError, GenerateRequest, GenerationKind};
use crate::bus::{Inbox, MessageBus};
use crate::domain::{Artifact, Message, Payload, Task};
use crate::error::TandemError;
use crate::id::branch_name;
use crate::vcs::VersionControl;

const IMPROVEMENT_BRANCH: &str = "improvement";

/// Why an attempt produced nothing
#[derive(Debug)]
struct Failure {
    reason: String,
    retryable: bool,
}

impl From<BackendError> for Failure {
    fn from(e: BackendError) -> Self {
        Self {
            retryable: e.is_retryable(),
            reason: e.to_string(),
        }
    }
}

impl From<TandemError> for Failure {
    fn from(e: TandemError) -> Self {
        // the same artifact would be rejected again
        let retryable = !matches!(e, TandemError::UnsafePath(_));
        Self {
            reason: e.to_string(),
            retryable,
        }
    }
}

pub struct ExecutorAgent {
    bus: Arc<MessageBus>,
    inbox: Inbox,
    backend: Arc<dyn Backend>,
    vcs: Arc<dyn VersionControl>,
    timeout: Duration,
    /// Task and run of every assignment seen, for revisions
    assignments: HashMap<String, (String, Task)>,
}

impl ExecutorAgent {
    pub fn new(
        bus: Arc<MessageBus>,
        inbox: Inbox,
        backend: Arc<dyn Backend>,
        vcs: Arc<dyn VersionControl>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            inbox,
            backend,
            vcs,
            timeout,
            assignments: HashMap::new(),
        }
    }

    /// Process messages until the bus closes
    pub async fn run(mut self) {
        info!("Executor: started (backend {})", self.backend.name());
        while let Some(message) = self.inbox.recv().await {
            self.handle(message).await;
        }
        debug!("Executor: inbox closed");
    }

    async fn handle(&mut self, message: Message) {
        match message.payload {
            Payload::TaskAssigned { run_id, task } => {
                self.assignments.insert(task.id.clone(), (run_id.clone(), task.clone()));
                let request = GenerateRequest::fresh(&run_id, task.clone());
                self.submit(&run_id, &task, request).await;
            }
            Payload::PrFeedback {
                task_id,
                iteration,
                feedback,
                artifact,
                ..
            } => {
                let Some((run_id, task)) = self.assignments.get(&task_id).cloned() else {
                    warn!("Executor: feedback for unknown task {}, dropping", task_id);
                    return;
                };
                let request = GenerateRequest::revision(&run_id, task.clone(), artifact, feedback, iteration);
                self.submit(&run_id, &task, request).await;
            }
            Payload::ImprovementRequested {
                run_id,
                requirement,
                completed_tasks,
            } => {
                let request = GenerateRequest::improvement(&run_id, &requirement, &completed_tasks);
                match self.produce(&run_id, IMPROVEMENT_BRANCH, &request).await {
                    Ok(artifact) => {
                        info!("Executor: improvement pass opened {}", artifact.reference);
                        self.send(PLANNER, Payload::ImprovementCompleted { artifact }).await;
                    }
                    Err(failure) => self.report(None, failure).await,
                }
            }
            other => {
                warn!(
                    "Executor: ignoring {} from {}",
                    other.message_type(),
                    message.from_agent
                );
            }
        }
    }

    async fn submit(&self, run_id: &str, task: &Task, request: GenerateRequest) {
        match self.produce(run_id, &task.id, &request).await {
            Ok(artifact) => {
                info!(
                    "Executor: {} revision {} submitted as {}",
                    task.id, artifact.revision, artifact.reference
                );
                self.send(
                    PLANNER,
                    Payload::PrSubmitted {
                        task_id: task.id.clone(),
                        artifact,
                    },
                )
                .await;
            }
            Err(failure) => self.report(Some(task.id.clone()), failure).await,
        }
    }

    /// Backend call, then branch, commit and review
    async fn produce(&self, run_id: &str, branch_key: &str, request: &GenerateRequest) -> Result<Artifact, Failure> {
        let generated = match tokio::time::timeout(self.timeout, self.backend.generate(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(BackendError::Timeout(self.timeout).into()),
        };
        if generated.files.is_empty() {
            return Err(BackendError::InvalidOutput("backend produced no files".to_string()).into());
        }

        let revision = request.next_revision();
        let mut artifact = generated.with_revision(revision);
        artifact.task_id = match request.kind {
            GenerationKind::Improvement => None,
            _ => Some(request.task.id.clone()),
        };

        let branch = branch_name(run_id, branch_key);
        self.vcs.create_branch(&branch).await?;
        let message = format!("{} (revision {})", request.task.description, revision);
        self.vcs.commit(&branch, &artifact.files, &message).await?;
        let handle = self.vcs.open_review(&branch, &artifact.summary).await?;

        Ok(artifact.with_reference(handle.id))
    }

    async fn report(&self, task_id: Option<String>, failure: Failure) {
        warn!(
            "Executor: {} failed: {}",
            task_id.as_deref().unwrap_or(IMPROVEMENT_BRANCH),
            failure.reason
        );
        self.send(
            ORCHESTRATOR,
            Payload::AgentError {
                task_id,
                reason: failure.reason,
                retryable: failure.retryable,
            },
        )
        .await;
    }

    async fn send(&self, to: &str, payload: Payload) {
        if let Err(e) = self.bus.publish(Message::new(EXECUTOR, to, payload)).await {
            error!("Executor: publish to {} failed: {}", to, e);
        }
    }
}
