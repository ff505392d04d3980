//! Code-generation backends
//!
//! The executor talks to a backend only through [`Backend::generate`]. Which
//! backend runs is decided once, from configuration, by
//! [`BackendConfig::build`].

pub mod command;
pub mod template;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Artifact, Task};
use crate::review::{Feedback, FeedbackFormatter};

pub use command::CommandBackend;
pub use template::TemplateBackend;

/// Default per-invocation timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Why a backend call produced no artifact
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend failed: {0}")]
    Failed(String),

    #[error("backend returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("backend IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether re-sending the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout(_) | BackendError::Failed(_) => true,
            BackendError::InvalidOutput(_) => false,
            BackendError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
        }
    }
}

/// What kind of generation is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Fresh,
    Revision,
    Improvement,
}

/// Input to one backend invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub run_id: String,
    pub kind: GenerationKind,
    pub task: Task,
    /// Previous submission, for revisions
    pub prior: Option<Artifact>,
    pub feedback: Option<Feedback>,
    /// `feedback` rendered as markdown for prompt-driven backends
    pub feedback_markdown: Option<String>,
}

impl GenerateRequest {
    pub fn fresh(run_id: impl Into<String>, task: Task) -> Self {
        Self {
            run_id: run_id.into(),
            kind: GenerationKind::Fresh,
            task,
            prior: None,
            feedback: None,
            feedback_markdown: None,
        }
    }

    /// Revise `prior` in light of `feedback`
    pub fn revision(run_id: impl Into<String>, task: Task, prior: Artifact, feedback: Feedback, iteration: u32) -> Self {
        let markdown = FeedbackFormatter::new().format(&feedback, iteration);
        Self {
            run_id: run_id.into(),
            kind: GenerationKind::Revision,
            task,
            prior: Some(prior),
            feedback: Some(feedback),
            feedback_markdown: Some(markdown),
        }
    }

    /// The one-shot optimization pass over the finished run
    pub fn improvement(run_id: impl Into<String>, requirement: &str, completed_tasks: &[String]) -> Self {
        let mut criteria = vec![format!("Optimize the implementation of: {}", requirement)];
        criteria.extend(completed_tasks.iter().map(|id| format!("Keep {} behavior intact", id)));

        let mut task = Task::new(0, format!("Improve {}", requirement), criteria, "improvement");
        task.id = "improvement".to_string();

        Self {
            run_id: run_id.into(),
            kind: GenerationKind::Improvement,
            task,
            prior: None,
            feedback: None,
            feedback_markdown: None,
        }
    }

    /// Revision number the produced artifact will carry
    pub fn next_revision(&self) -> u32 {
        self.prior.as_ref().map(|p| p.revision + 1).unwrap_or(0)
    }
}

/// Produces artifacts for tasks.
///
/// Implementations must tolerate being re-invoked with the same request after
/// a timeout; the caller owns the timeout and drops the future on expiry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name recorded as the task's assigned backend
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<Artifact, BackendError>;
}

/// Which backend to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendConfig {
    /// External program speaking JSON over stdin/stdout
    #[serde(rename_all = "kebab-case")]
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Offline deterministic generator
    #[serde(rename_all = "kebab-case")]
    Template {
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Template {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Per-invocation timeout the executor applies
    pub fn timeout(&self) -> Duration {
        match self {
            BackendConfig::Command { timeout_secs, .. } | BackendConfig::Template { timeout_secs } => {
                Duration::from_secs(*timeout_secs)
            }
        }
    }

    pub fn build(&self) -> Box<dyn Backend> {
        match self {
            BackendConfig::Command { program, args, .. } => Box::new(CommandBackend::new(program, args.clone())),
            BackendConfig::Template { .. } => Box::new(TemplateBackend::new()),
        }
    }
}
