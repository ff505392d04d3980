//! Run orchestration.
//!
//! The orchestrator owns the bus and the persisted [`ProjectState`]. For each
//! run it decomposes the requirement, spawns the planner and executor as tokio
//! tasks, and then only watches: every message passes through its tap and is
//! mirrored by [`RunMirror`]. It steps in for two things, re-sending a command
//! after a retryable backend error and failing the run when the wall-clock
//! budget runs out.

pub mod mirror;
pub mod recovery;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::agents::{Decomposer, EXECUTOR, ExecutorAgent, ORCHESTRATOR, PLANNER, PlannerAgent, PlannerContext, TemplateDecomposer};
use crate::backend::{Backend, DEFAULT_TIMEOUT_SECS};
use crate::bus::{DEFAULT_CAPACITY, MessageBus};
use crate::config::TandemConfig;
use crate::domain::{MAX_ITERATIONS, ProjectState, RunStatus, RunSummary, WorkLogEntry};
use crate::error::{Result, TandemError};
use crate::id::generate_run_id;
use crate::review::ReviewScorer;
use crate::storage::{RunStore, WorkLog};
use crate::vcs::VersionControl;

pub use mirror::{RunMirror, Step};
pub use recovery::Recovery;

const FAR_DEADLINE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Limits applied to every run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_tasks: usize,
    pub max_iterations: u32,
    pub max_backend_retries: u32,
    /// Wall-clock budget per `run`/`resume` call
    pub budget: Duration,
    pub bus_capacity: usize,
    pub backend_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_tasks: 10,
            max_iterations: MAX_ITERATIONS,
            max_backend_retries: 2,
            budget: Duration::from_secs(3600),
            bus_capacity: DEFAULT_CAPACITY,
            backend_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl From<&TandemConfig> for RunSettings {
    fn from(config: &TandemConfig) -> Self {
        Self {
            max_tasks: config.run.max_tasks,
            max_iterations: config.run.max_iterations,
            max_backend_retries: config.run.max_backend_retries,
            budget: Duration::from_secs(config.run.budget_secs),
            bus_capacity: config.run.bus_capacity,
            backend_timeout: config.backend.timeout(),
        }
    }
}

pub struct Orchestrator {
    settings: RunSettings,
    store: RunStore,
    backend: Arc<dyn Backend>,
    vcs: Arc<dyn VersionControl>,
    scorer: Arc<ReviewScorer>,
    decomposer: Box<dyn Decomposer>,
}

impl Orchestrator {
    pub fn new(settings: RunSettings, store: RunStore, backend: Arc<dyn Backend>, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            settings,
            store,
            backend,
            vcs,
            scorer: Arc::new(ReviewScorer::default()),
            decomposer: Box::new(TemplateDecomposer::new()),
        }
    }

    /// Build everything the configuration describes
    pub fn from_config(config: &TandemConfig) -> Self {
        Self::new(
            RunSettings::from(config),
            RunStore::new(&config.run.runs_dir),
            Arc::from(config.backend.build()),
            Arc::from(config.vcs.build()),
        )
        .with_scorer(ReviewScorer::new(&config.review))
    }

    pub fn with_scorer(mut self, scorer: ReviewScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    pub fn with_decomposer(mut self, decomposer: impl Decomposer + 'static) -> Self {
        self.decomposer = Box::new(decomposer);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Start a new run and drive it to a terminal state.
    ///
    /// A requirement that cannot be decomposed ends in a `failed` run, not an
    /// error. Errors are persistence failures.
    pub async fn run(&self, requirement: &str) -> Result<RunSummary> {
        let deadline = deadline_after(self.settings.budget);
        let state = ProjectState::new(generate_run_id(), requirement);
        info!("Orchestrator: starting {}", state.run_id);

        self.store.save(&state)?;
        let mut log = self.store.work_log(&state.run_id);
        log.append(WorkLogEntry::run_started(&state.run_id, requirement))?;

        self.start(state, log, deadline).await
    }

    /// Continue a run from its last snapshot.
    ///
    /// Completed and failed runs are reported without running anything.
    pub async fn resume(&self, run_id: &str) -> Result<RunSummary> {
        let deadline = deadline_after(self.settings.budget);
        let state = self.store.load(run_id)?;

        match recovery::prepare(state)? {
            Recovery::Finished(summary) => Ok(summary),
            Recovery::Replan(state) => {
                let mut log = self.store.work_log(run_id);
                log.append(WorkLogEntry::run_resumed(run_id, 0))?;
                self.start(state, log, deadline).await
            }
            Recovery::Resume(state) => {
                let mut log = self.store.work_log(run_id);
                log.append(WorkLogEntry::run_resumed(run_id, state.current_index))?;
                self.store.save(&state)?;
                self.drive(state, log, deadline).await
            }
        }
    }

    /// Decompose, persist the plan, then drive
    async fn start(&self, mut state: ProjectState, mut log: WorkLog, deadline: Instant) -> Result<RunSummary> {
        Self::advance(&mut state, &mut log, RunStatus::Decomposing)?;
        self.store.save(&state)?;

        let planned = tokio::time::timeout_at(
            deadline,
            PlannerAgent::plan(
                self.decomposer.as_ref(),
                &state.requirement,
                self.settings.max_tasks,
                self.backend.name(),
            ),
        )
        .await;

        let tasks = match planned {
            Ok(Ok(tasks)) => tasks,
            Ok(Err(TandemError::Decomposition(reason))) => {
                warn!("Orchestrator: {} could not be decomposed: {}", state.run_id, reason);
                return self.fail(state, log, &format!("decomposition failed: {}", reason));
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let reason = format!("wall-clock budget of {}s exceeded", self.settings.budget.as_secs());
                return self.fail(state, log, &reason);
            }
        };

        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        info!("Orchestrator: {} planned {} task(s)", state.run_id, ids.len());
        state.tasks = tasks;
        state.current_index = 0;
        log.append(WorkLogEntry::plan_created(&ids))?;
        Self::advance(&mut state, &mut log, RunStatus::Executing)?;
        self.store.save(&state)?;

        self.drive(state, log, deadline).await
    }

    fn fail(&self, mut state: ProjectState, mut log: WorkLog, reason: &str) -> Result<RunSummary> {
        state.fail(reason);
        self.store.save(&state)?;
        log.append(WorkLogEntry::run_failed(reason))?;
        Ok(state.summary())
    }

    fn advance(state: &mut ProjectState, log: &mut WorkLog, next: RunStatus) -> Result<()> {
        let old = state.status;
        state.transition(next)?;
        if old != next {
            log.append(WorkLogEntry::status_change(old.as_str(), next.as_str()))?;
        }
        Ok(())
    }

    /// Spawn both agents and mirror their traffic until the run is terminal
    async fn drive(&self, state: ProjectState, log: WorkLog, deadline: Instant) -> Result<RunSummary> {
        let (bus, mut tap) = MessageBus::observed(self.settings.bus_capacity, ORCHESTRATOR);
        let bus = Arc::new(bus);
        let planner_inbox = bus.subscribe(PLANNER)?;
        let executor_inbox = bus.subscribe(EXECUTOR)?;

        let ctx = PlannerContext {
            run_id: state.run_id.clone(),
            requirement: state.requirement.clone(),
            tasks: state.tasks.clone(),
            current_index: state.current_index,
            improvement_requested: state.improvement_requested,
            max_iterations: self.settings.max_iterations,
        };
        let executor = ExecutorAgent::new(
            bus.clone(),
            executor_inbox,
            self.backend.clone(),
            self.vcs.clone(),
            self.settings.backend_timeout,
        );
        let planner = PlannerAgent::new(ctx, self.scorer.clone(), bus.clone(), planner_inbox);
        let handles: Vec<JoinHandle<()>> = vec![tokio::spawn(executor.run()), tokio::spawn(planner.run())];

        let mut mirror = RunMirror::new(
            state,
            log,
            self.store.clone(),
            self.settings.max_iterations,
            self.settings.max_backend_retries,
        );
        let budget = tokio::time::sleep_until(deadline);
        tokio::pin!(budget);

        let outcome = loop {
            tokio::select! {
                _ = &mut budget => {
                    break mirror.expire(self.settings.budget.as_secs());
                }
                received = tap.recv() => {
                    let Some(message) = received else {
                        break mirror.halt("message bus closed unexpectedly");
                    };
                    match mirror.apply(&message) {
                        Ok(Step::Continue) => {}
                        Ok(Step::Publish(outgoing)) => {
                            // off the loop, so the tap keeps draining
                            let bus = bus.clone();
                            tokio::spawn(async move {
                                if let Err(e) = bus.publish(outgoing).await {
                                    warn!("Orchestrator: publish failed: {}", e);
                                }
                            });
                        }
                        Ok(Step::Finished) => break Ok(()),
                        Err(e) => {
                            error!("Orchestrator: halting {}: {}", mirror.state().run_id, e);
                            break Err(e);
                        }
                    }
                }
            }
        };

        bus.close();
        for handle in &handles {
            handle.abort();
        }
        futures::future::join_all(handles).await;
        outcome?;

        let state = mirror.into_state();
        info!("Orchestrator: {} finished as {}", state.run_id, state.status);
        Ok(state.summary())
    }
}

/// Budgets too large for the clock end in the far future instead
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_DEADLINE))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TemplateBackend;
    use crate::domain::TaskStatus;
    use crate::vcs::MemoryVcs;
    use tempfile::TempDir;

    fn orchestrator(temp: &TempDir) -> Orchestrator {
        Orchestrator::new(
            RunSettings::default(),
            RunStore::new(temp.path()),
            Arc::new(TemplateBackend::new()),
            Arc::new(MemoryVcs::new()),
        )
    }

    #[tokio::test]
    async fn test_template_run_completes() {
        let temp = TempDir::new().unwrap();
        let orch = orchestrator(&temp);

        let summary = orch
            .run("- Parse the config file\n- Validate the parsed values")
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.completed.len(), 2);
        assert!(summary.improvement_artifact.is_some());

        let state = orch.store().load(&summary.run_id).unwrap();
        assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert!(state.improvement_requested);
    }

    #[tokio::test]
    async fn test_empty_requirement_fails_run() {
        let temp = TempDir::new().unwrap();
        let orch = orchestrator(&temp);

        let summary = orch.run("   ").await.unwrap();
        assert_eq!(summary.status, RunStatus::Failed);
        assert!(summary.failure_reason.unwrap().contains("decomposition"));
    }

    #[tokio::test]
    async fn test_resume_unknown_run_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(orchestrator(&temp).resume("run-missing").await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_budget_still_runs() {
        let temp = TempDir::new().unwrap();
        let settings = RunSettings {
            budget: Duration::MAX,
            ..RunSettings::default()
        };
        let orch = Orchestrator::new(
            settings,
            RunStore::new(temp.path()),
            Arc::new(TemplateBackend::new()),
            Arc::new(MemoryVcs::new()),
        );

        let summary = orch.run("- a").await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
    }

    #[test]
    fn test_deadline_after_saturates() {
        let before = Instant::now();
        assert!(deadline_after(Duration::MAX) > before + Duration::from_secs(3600));
        assert!(deadline_after(Duration::from_secs(1)) <= Instant::now() + Duration::from_secs(1));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = TandemConfig::default();
        config.run.budget_secs = 5;
        config.run.max_backend_retries = 0;
        let settings = RunSettings::from(&config);
        assert_eq!(settings.budget, Duration::from_secs(5));
        assert_eq!(settings.max_backend_retries, 0);
        assert_eq!(settings.backend_timeout, config.backend.timeout());
    }
}
