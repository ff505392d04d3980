//! Planning and review agent.
//!
//! Holds its own copy of the plan and walks it one task at a time:
//!
//! ```text
//! assign -> PR_SUBMITTED -> score
//!             approved            -> TASK_COMPLETED(approved), next task
//!             rejected, below cap -> PR_FEEDBACK
//!             rejected, at cap    -> TASK_COMPLETED(escalated), next task
//! no tasks left -> IMPROVEMENT_REQUESTED (once per run) -> AGENT_READY
//! ```

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::agents::decomposer::Decomposer;
use crate::agents::{EXECUTOR, ORCHESTRATOR, PLANNER};
use crate::bus::{Inbox, MessageBus};
use crate::domain::{Artifact, CompletionOutcome, Message, Payload, ReviewDecision, Task, TaskStatus};
use crate::error::{Result, TandemError};
use crate::review::ReviewScorer;

/// Everything the planner needs to pick up a run
#[derive(Debug, Clone)]
pub struct PlannerContext {
    pub run_id: String,
    pub requirement: String,
    pub tasks: Vec<Task>,
    /// First task to look at
    pub current_index: usize,
    /// Whether the improvement phase was already requested in this run
    pub improvement_requested: bool,
    pub max_iterations: u32,
}

/// Where the improvement phase stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Tasks,
    Improving,
    Done,
}

pub struct PlannerAgent {
    ctx: PlannerContext,
    phase: Phase,
    /// Task whose submission is expected next
    awaiting: Option<String>,
    scorer: Arc<ReviewScorer>,
    bus: Arc<MessageBus>,
    inbox: Inbox,
}

impl PlannerAgent {
    /// Decompose a requirement and check the result against the plan contract
    pub async fn plan(
        decomposer: &dyn Decomposer,
        requirement: &str,
        max_tasks: usize,
        backend: &str,
    ) -> Result<Vec<Task>> {
        let tasks = decomposer.decompose(requirement, max_tasks, backend).await?;
        if tasks.is_empty() || tasks.len() > max_tasks {
            return Err(TandemError::Decomposition(format!(
                "plan has {} tasks, expected 1..={}",
                tasks.len(),
                max_tasks
            )));
        }
        if let Some(task) = tasks.iter().find(|t| t.acceptance_criteria.is_empty()) {
            return Err(TandemError::Decomposition(format!(
                "{} has no acceptance criteria",
                task.id
            )));
        }
        Ok(tasks)
    }

    pub fn new(ctx: PlannerContext, scorer: Arc<ReviewScorer>, bus: Arc<MessageBus>, inbox: Inbox) -> Self {
        Self {
            ctx,
            phase: Phase::Tasks,
            awaiting: None,
            scorer,
            bus,
            inbox,
        }
    }

    /// Assign the first open task, then process messages until the bus closes
    pub async fn run(mut self) {
        info!(
            "Planner: starting {} with {} tasks at index {}",
            self.ctx.run_id,
            self.ctx.tasks.len(),
            self.ctx.current_index
        );
        self.advance().await;
        while let Some(message) = self.inbox.recv().await {
            self.handle(message).await;
        }
        debug!("Planner: inbox closed");
    }

    async fn handle(&mut self, message: Message) {
        let from = message.from_agent.clone();
        match message.payload {
            Payload::PrSubmitted { task_id, artifact } => self.review(task_id, artifact).await,
            Payload::AgentError { task_id, reason, .. } => self.on_error(task_id, reason).await,
            Payload::ImprovementCompleted { artifact } => {
                if self.phase != Phase::Improving {
                    warn!("Planner: unexpected IMPROVEMENT_COMPLETED from {}, dropping", from);
                    return;
                }
                info!("Planner: improvement pass done ({})", artifact.reference);
                self.finish().await;
            }
            other => {
                warn!("Planner: dropping {} from {}", other.message_type(), from);
            }
        }
    }

    async fn review(&mut self, task_id: String, artifact: Artifact) {
        if self.awaiting.as_deref() != Some(task_id.as_str()) {
            warn!(
                "Planner: submission for {} but awaiting {:?}, dropping",
                task_id, self.awaiting
            );
            return;
        }
        let Some(task) = self.ctx.tasks.get_mut(self.ctx.current_index) else {
            warn!("Planner: no current task for submission {}, dropping", task_id);
            return;
        };

        let outcome = self.scorer.review(task, &artifact);
        let score = outcome.score.clone();
        let decision = task.record_review(score.clone(), self.ctx.max_iterations);
        let iteration = task.iteration_count;
        self.awaiting = None;

        match decision {
            ReviewDecision::Approved => {
                info!("Planner: {} approved with {}", task_id, score);
                self.send(
                    ORCHESTRATOR,
                    Payload::TaskCompleted {
                        task_id,
                        outcome: CompletionOutcome::Approved,
                        iteration,
                        score: Some(score),
                        reason: None,
                    },
                )
                .await;
                self.ctx.current_index += 1;
                self.advance().await;
            }
            ReviewDecision::Revise { iteration } => {
                info!("Planner: {} rejected with {}, iteration {}", task_id, score, iteration);
                self.awaiting = Some(task_id.clone());
                self.send(
                    EXECUTOR,
                    Payload::PrFeedback {
                        task_id,
                        iteration,
                        score,
                        feedback: outcome.feedback(),
                        artifact,
                    },
                )
                .await;
            }
            ReviewDecision::Escalate => {
                warn!(
                    "Planner: {} escalated after {} rejected submissions (last {})",
                    task_id, iteration, score
                );
                self.send(
                    ORCHESTRATOR,
                    Payload::TaskCompleted {
                        task_id,
                        outcome: CompletionOutcome::Escalated,
                        iteration,
                        score: Some(score),
                        reason: Some("iteration cap reached".to_string()),
                    },
                )
                .await;
                self.ctx.current_index += 1;
                self.advance().await;
            }
        }
    }

    /// Retries are exhausted; the task (or the improvement pass) has failed
    async fn on_error(&mut self, task_id: Option<String>, reason: String) {
        match task_id {
            Some(task_id) => {
                if self.awaiting.as_deref() != Some(task_id.as_str()) {
                    warn!("Planner: error for {} which is not in flight, dropping", task_id);
                    return;
                }
                let Some(task) = self.ctx.tasks.get_mut(self.ctx.current_index) else {
                    return;
                };
                task.fail(reason.clone());
                let iteration = task.iteration_count;
                self.awaiting = None;
                warn!("Planner: {} failed: {}", task_id, reason);
                self.send(
                    ORCHESTRATOR,
                    Payload::TaskCompleted {
                        task_id,
                        outcome: CompletionOutcome::Failed,
                        iteration,
                        score: None,
                        reason: Some(reason),
                    },
                )
                .await;
                self.ctx.current_index += 1;
                self.advance().await;
            }
            None if self.phase == Phase::Improving => {
                warn!("Planner: improvement pass failed: {}", reason);
                self.finish().await;
            }
            None => warn!("Planner: stray error ({}), dropping", reason),
        }
    }

    /// Assign the next open task, or move on to the improvement phase
    async fn advance(&mut self) {
        if self.phase != Phase::Tasks {
            return;
        }
        let next = self
            .ctx
            .tasks
            .iter()
            .enumerate()
            .skip(self.ctx.current_index)
            .find(|(_, t)| !t.is_terminal())
            .map(|(i, _)| i);

        match next {
            Some(index) => {
                self.ctx.current_index = index;
                let task = &mut self.ctx.tasks[index];
                task.status = TaskStatus::InProgress;
                let task = task.clone();
                info!("Planner: assigning {} ({})", task.id, task.description);
                self.awaiting = Some(task.id.clone());
                self.send(
                    EXECUTOR,
                    Payload::TaskAssigned {
                        run_id: self.ctx.run_id.clone(),
                        task,
                    },
                )
                .await;
            }
            None => {
                self.ctx.current_index = self.ctx.tasks.len();
                self.request_improvement().await;
            }
        }
    }

    /// Enter the one-shot improvement phase; a second request is a no-op
    async fn request_improvement(&mut self) {
        if self.phase != Phase::Tasks {
            debug!("Planner: improvement already handled");
            return;
        }
        if self.ctx.improvement_requested {
            info!("Planner: improvement already consumed for {}", self.ctx.run_id);
            self.finish().await;
            return;
        }

        self.ctx.improvement_requested = true;
        self.phase = Phase::Improving;
        let completed_tasks = self
            .ctx
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();
        info!("Planner: all tasks settled, requesting improvement pass");
        self.send(
            EXECUTOR,
            Payload::ImprovementRequested {
                run_id: self.ctx.run_id.clone(),
                requirement: self.ctx.requirement.clone(),
                completed_tasks,
            },
        )
        .await;
    }

    async fn finish(&mut self) {
        if self.phase == Phase::Done {
            return;
        }
        self.phase = Phase::Done;
        self.send(
            ORCHESTRATOR,
            Payload::AgentReady {
                agent: PLANNER.to_string(),
            },
        )
        .await;
    }

    async fn send(&self, to: &str, payload: Payload) {
        if let Err(e) = self.bus.publish(Message::new(PLANNER, to, payload)).await {
            error!("Planner: publish to {} failed: {}", to, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::TemplateDecomposer;
    use crate::domain::{ArtifactFile, MessageType};
    use crate::review::{Assessment, Criterion, CriterionEvaluator};

    /// Scores every submission with the percentage written in its summary
    struct SummaryPercent;

    impl CriterionEvaluator for SummaryPercent {
        fn criterion(&self) -> Criterion {
            Criterion::Functionality
        }

        fn evaluate(&self, _task: &Task, artifact: &Artifact) -> Assessment {
            Assessment::new(artifact.summary.parse().unwrap_or(0), Vec::new())
        }
    }

    struct Full(Criterion);

    impl CriterionEvaluator for Full {
        fn criterion(&self) -> Criterion {
            self.0
        }

        fn evaluate(&self, _task: &Task, _artifact: &Artifact) -> Assessment {
            Assessment::full()
        }
    }

    /// functionality decides: 100% -> 100 points, 0% -> 70 points
    fn scorer() -> Arc<ReviewScorer> {
        Arc::new(
            ReviewScorer::default()
                .with_evaluator(SummaryPercent)
                .with_evaluator(Full(Criterion::Testing))
                .with_evaluator(Full(Criterion::Quality))
                .with_evaluator(Full(Criterion::Documentation))
                .with_evaluator(Full(Criterion::EdgeCases)),
        )
    }

    struct Harness {
        bus: Arc<MessageBus>,
        tap: Inbox,
        executor: Inbox,
    }

    impl Harness {
        async fn next_to_executor(&mut self) -> Message {
            self.executor.recv().await.unwrap()
        }

        /// Drain the tap until a message of `kind` shows up
        async fn wait_for(&mut self, kind: MessageType) -> Message {
            loop {
                let message = self.tap.recv().await.unwrap();
                if message.message_type() == kind {
                    return message;
                }
            }
        }

        async fn submit(&self, task_id: &str, percent: u32) {
            let artifact = Artifact::new(
                Some(task_id.to_string()),
                percent.to_string(),
                vec![ArtifactFile::new("a.rs", "x")],
            );
            self.bus
                .publish(Message::new(
                    EXECUTOR,
                    PLANNER,
                    Payload::PrSubmitted {
                        task_id: task_id.to_string(),
                        artifact,
                    },
                ))
                .await
                .unwrap();
        }
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task::new(i, format!("task {}", i), vec!["works".to_string()], "template"))
            .collect()
    }

    fn start_with(tasks: Vec<Task>, current_index: usize, improvement_requested: bool) -> Harness {
        let (bus, tap) = MessageBus::observed(64, ORCHESTRATOR);
        let bus = Arc::new(bus);
        let inbox = bus.subscribe(PLANNER).unwrap();
        let executor = bus.subscribe(EXECUTOR).unwrap();
        let ctx = PlannerContext {
            run_id: "run-1".to_string(),
            requirement: "do things".to_string(),
            tasks,
            current_index,
            improvement_requested,
            max_iterations: 3,
        };
        tokio::spawn(PlannerAgent::new(ctx, scorer(), bus.clone(), inbox).run());
        Harness { bus, tap, executor }
    }

    fn assigned_id(message: &Message) -> String {
        match &message.payload {
            Payload::TaskAssigned { task, .. } => task.id.clone(),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plan_checks_contract() {
        let tasks = PlannerAgent::plan(&TemplateDecomposer::new(), "- a\n- b", 5, "template")
            .await
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(PlannerAgent::plan(&TemplateDecomposer::new(), "", 5, "template").await.is_err());
    }

    #[tokio::test]
    async fn test_first_submission_approved() {
        let mut h = start_with(tasks(1), 0, false);
        assert_eq!(assigned_id(&h.next_to_executor().await), "task-001");

        h.submit("task-001", 100).await;
        match h.wait_for(MessageType::TaskCompleted).await.payload {
            Payload::TaskCompleted {
                outcome, iteration, ..
            } => {
                assert_eq!(outcome, CompletionOutcome::Approved);
                assert_eq!(iteration, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            h.next_to_executor().await.message_type(),
            MessageType::ImprovementRequested
        );
    }

    #[tokio::test]
    async fn test_rejection_sends_feedback_then_escalates() {
        let mut h = start_with(tasks(2), 0, false);
        h.next_to_executor().await;

        for expected in 1..=2 {
            h.submit("task-001", 0).await;
            match h.next_to_executor().await.payload {
                Payload::PrFeedback { iteration, score, .. } => {
                    assert_eq!(iteration, expected);
                    assert_eq!(score.total, 70);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        h.submit("task-001", 0).await;

        match h.wait_for(MessageType::TaskCompleted).await.payload {
            Payload::TaskCompleted {
                outcome, iteration, ..
            } => {
                assert_eq!(outcome, CompletionOutcome::Escalated);
                assert_eq!(iteration, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        // the run moves on
        assert_eq!(assigned_id(&h.next_to_executor().await), "task-002");
    }

    #[tokio::test]
    async fn test_submission_for_wrong_task_dropped() {
        let mut h = start_with(tasks(2), 0, false);
        h.next_to_executor().await;

        h.submit("task-002", 100).await;
        h.submit("task-404", 100).await;
        h.submit("task-001", 100).await;

        assert_eq!(assigned_id(&h.next_to_executor().await), "task-002");
    }

    #[tokio::test]
    async fn test_forwarded_error_fails_task_and_advances() {
        let mut h = start_with(tasks(2), 0, false);
        h.next_to_executor().await;

        h.bus
            .publish(Message::new(
                ORCHESTRATOR,
                PLANNER,
                Payload::AgentError {
                    task_id: Some("task-001".to_string()),
                    reason: "backend down".to_string(),
                    retryable: false,
                },
            ))
            .await
            .unwrap();

        match h.wait_for(MessageType::TaskCompleted).await.payload {
            Payload::TaskCompleted { outcome, reason, .. } => {
                assert_eq!(outcome, CompletionOutcome::Failed);
                assert_eq!(reason.as_deref(), Some("backend down"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(assigned_id(&h.next_to_executor().await), "task-002");
    }

    #[tokio::test]
    async fn test_improvement_requested_once_then_ready() {
        let mut h = start_with(tasks(1), 0, false);
        h.next_to_executor().await;
        h.submit("task-001", 100).await;
        assert_eq!(
            h.next_to_executor().await.message_type(),
            MessageType::ImprovementRequested
        );

        // a duplicate submission after the last task cannot re-trigger it
        h.submit("task-001", 100).await;

        let done = Artifact::new(None, "opt", vec![ArtifactFile::new("a.rs", "y")]);
        for _ in 0..2 {
            h.bus
                .publish(Message::new(
                    EXECUTOR,
                    PLANNER,
                    Payload::ImprovementCompleted {
                        artifact: done.clone(),
                    },
                ))
                .await
                .unwrap();
        }

        h.wait_for(MessageType::AgentReady).await;
        h.bus.close();
        let mut rest = Vec::new();
        while let Some(message) = h.tap.recv().await {
            rest.push(message.message_type());
        }
        assert!(!rest.contains(&MessageType::AgentReady));
        assert!(h.executor.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resume_with_consumed_improvement_goes_straight_to_ready() {
        let mut all = tasks(2);
        all[0].status = TaskStatus::Completed;
        all[1].status = TaskStatus::Escalated;
        let mut h = start_with(all, 1, true);

        match h.wait_for(MessageType::AgentReady).await.payload {
            Payload::AgentReady { agent } => assert_eq!(agent, PLANNER),
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.executor.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resume_reassigns_first_open_task() {
        let mut all = tasks(3);
        all[0].status = TaskStatus::Completed;
        all[1].iteration_count = 2;
        let mut h = start_with(all, 1, false);

        let assigned = h.next_to_executor().await;
        match assigned.payload {
            Payload::TaskAssigned { task, .. } => {
                assert_eq!(task.id, "task-002");
                assert_eq!(task.iteration_count, 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        // one more rejection reaches the cap
        h.submit("task-002", 0).await;
        match h.wait_for(MessageType::TaskCompleted).await.payload {
            Payload::TaskCompleted { outcome, .. } => assert_eq!(outcome, CompletionOutcome::Escalated),
            other => panic!("unexpected {:?}", other),
        }
    }
}
