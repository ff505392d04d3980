//! Shared fixtures for run-level integration tests
//!
//! The scripted backend answers each task with a queue of replies. A
//! `Percent(p)` reply produces an artifact whose summary is `p`, and the
//! scripted scorer rates every criterion at that percentage, so the total
//! score of a submission is (within rounding) `p`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tandem::backend::{Backend, BackendError, GenerateRequest};
use tandem::domain::{Artifact, ArtifactFile, Task};
use tandem::orchestrator::{Orchestrator, RunSettings};
use tandem::review::{Assessment, Criterion, CriterionEvaluator, Issue, IssuePriority, ReviewScorer};
use tandem::storage::RunStore;
use tandem::vcs::MemoryVcs;
use tempfile::TempDir;

pub const REQUIREMENT: &str = "- Parse the configuration file\n- Validate every parsed value";

/// One scripted backend answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    /// Artifact scored at this percentage
    Percent(u32),
    /// Never answers within any sane timeout
    Hang,
    /// Unusable output (not retryable)
    Invalid,
    /// Transient failure (retryable)
    Broken,
    /// Artifact writing outside its branch
    Escaping,
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for a task id ("improvement" for the improvement pass)
    pub fn script(self, task_id: &str, replies: &[Reply]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), replies.iter().copied().collect());
        self
    }

    /// Task ids in invocation order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task_id: &str) -> usize {
        self.calls().iter().filter(|id| *id == task_id).count()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Artifact, BackendError> {
        let id = request.task.id.clone();
        self.calls.lock().unwrap().push(id.clone());
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Reply::Percent(100));

        match reply {
            Reply::Percent(p) => Ok(Artifact::new(
                Some(id.clone()),
                p.to_string(),
                vec![ArtifactFile::new(
                    format!("src/{}.rs", id),
                    format!("// {} revision {}\n", id, request.next_revision()),
                )],
            )),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Failed("woke up".to_string()))
            }
            Reply::Invalid => Err(BackendError::InvalidOutput("not an artifact".to_string())),
            Reply::Broken => Err(BackendError::Failed("exit status 1".to_string())),
            Reply::Escaping => Ok(Artifact::new(
                Some(id.clone()),
                "100",
                vec![ArtifactFile::new("../outside.rs", "// escaped\n")],
            )),
        }
    }
}

/// Rates one criterion at the percentage written in the artifact summary
pub struct SummaryPercent(pub Criterion);

impl CriterionEvaluator for SummaryPercent {
    fn criterion(&self) -> Criterion {
        self.0
    }

    fn evaluate(&self, _task: &Task, artifact: &Artifact) -> Assessment {
        let percent = artifact.summary.parse().unwrap_or(0);
        let issues = if percent < 100 {
            vec![Issue::new(self.0, IssuePriority::Medium, format!("{} below target", self.0))]
        } else {
            Vec::new()
        };
        Assessment::new(percent, issues)
    }
}

pub fn scripted_scorer() -> ReviewScorer {
    Criterion::ALL
        .iter()
        .fold(ReviewScorer::default(), |scorer, c| scorer.with_evaluator(SummaryPercent(*c)))
}

pub fn settings() -> RunSettings {
    RunSettings {
        max_tasks: 5,
        max_iterations: 3,
        max_backend_retries: 2,
        budget: Duration::from_secs(30),
        bus_capacity: 8,
        backend_timeout: Duration::from_millis(200),
    }
}

pub struct Fixture {
    pub temp: TempDir,
    pub backend: Arc<ScriptedBackend>,
    pub vcs: Arc<MemoryVcs>,
}

impl Fixture {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            backend: Arc::new(backend),
            vcs: Arc::new(MemoryVcs::new()),
        }
    }

    pub fn store(&self) -> RunStore {
        RunStore::new(self.temp.path())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(settings())
    }

    pub fn orchestrator_with(&self, settings: RunSettings) -> Orchestrator {
        Orchestrator::new(settings, self.store(), self.backend.clone(), self.vcs.clone()).with_scorer(scripted_scorer())
    }
}
