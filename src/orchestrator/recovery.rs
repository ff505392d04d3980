//! Picking up a run from its last snapshot.
//!
//! A snapshot is either finished (reported as-is), interrupted before a plan
//! existed (decomposed again), or interrupted mid-plan. In the last case every
//! non-terminal task goes back to `pending` with its iteration count and score
//! history intact; the planner then re-assigns the first open one.

use log::{info, warn};

use crate::domain::{ProjectState, RunSummary, TaskStatus};
use crate::error::Result;
use crate::storage::RunStore;

/// What resuming a snapshot amounts to
#[derive(Debug, Clone)]
pub enum Recovery {
    /// Run was already completed or failed; nothing to do
    Finished(RunSummary),

    /// Crashed before a plan was saved
    Replan(ProjectState),

    /// Plan exists; state has been reset and is ready to drive
    Resume(ProjectState),
}

impl Recovery {
    pub fn is_finished(&self) -> bool {
        matches!(self, Recovery::Finished(_))
    }
}

/// Classify a reloaded snapshot and prepare it for driving
pub fn prepare(mut state: ProjectState) -> Result<Recovery> {
    if state.status.is_terminal() {
        info!("Run {} is already {}, reporting", state.run_id, state.status);
        return Ok(Recovery::Finished(state.summary()));
    }
    if state.tasks.is_empty() {
        warn!("Run {} has no plan, decomposing again", state.run_id);
        return Ok(Recovery::Replan(state));
    }

    let reset = state
        .tasks
        .iter()
        .filter(|t| !t.is_terminal() && t.status != TaskStatus::Pending)
        .count();
    state.reset_for_resume()?;
    info!(
        "Run {} resumes at task {} ({} in-flight task(s) reset)",
        state.run_id, state.current_index, reset
    );
    Ok(Recovery::Resume(state))
}

/// Runs whose last snapshot is not terminal, newest first
pub fn interrupted(store: &RunStore) -> Result<Vec<ProjectState>> {
    Ok(store
        .list()?
        .into_iter()
        .filter(|state| !state.status.is_terminal())
        .collect())
}
