//! Run persistence.
//!
//! Each run owns a directory under the runs dir:
//!
//! ```text
//! <runs-dir>/<run-id>/state.json     latest ProjectState snapshot
//! <runs-dir>/<run-id>/worklog.jsonl  append-only WorkLogEntry stream
//! ```

pub mod jsonl;
pub mod snapshot;
pub mod worklog;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::ProjectState;
use crate::error::{Result, TandemError};

pub use jsonl::JsonlFile;
pub use worklog::WorkLog;

const STATE_FILE: &str = "state.json";
const WORKLOG_FILE: &str = "worklog.jsonl";

/// Access to all persisted runs
#[derive(Debug, Clone)]
pub struct RunStore {
    runs_dir: PathBuf,
}

impl RunStore {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id)
    }

    pub fn state_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(STATE_FILE)
    }

    pub fn exists(&self, run_id: &str) -> bool {
        self.state_path(run_id).exists()
    }

    /// Persist a snapshot, replacing the previous one atomically
    pub fn save(&self, state: &ProjectState) -> Result<()> {
        snapshot::write_atomic(&self.state_path(&state.run_id), state)?;
        debug!("Saved snapshot for {} ({})", state.run_id, state.status);
        Ok(())
    }

    pub fn load(&self, run_id: &str) -> Result<ProjectState> {
        snapshot::load(&self.state_path(run_id))?
            .ok_or_else(|| TandemError::Persistence(format!("no snapshot for run {}", run_id)))
    }

    /// Open the run's work log for appending and replay
    pub fn work_log(&self, run_id: &str) -> WorkLog {
        WorkLog::open(self.run_dir(run_id).join(WORKLOG_FILE))
    }

    /// All runs with a readable snapshot, newest first
    pub fn list(&self) -> Result<Vec<ProjectState>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut states = Vec::new();
        for entry in fs::read_dir(&self.runs_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().to_string();
            match snapshot::load::<ProjectState>(&self.state_path(&run_id)) {
                Ok(Some(state)) => states.push(state),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping unreadable run {}: {}", run_id, e),
            }
        }
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.run_id.cmp(&a.run_id)));
        Ok(states)
    }
}
