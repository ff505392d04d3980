//! The run's audit trail.

use std::path::{Path, PathBuf};

use crate::domain::WorkLogEntry;
use crate::error::Result;
use crate::storage::jsonl::JsonlFile;

/// Append-only log of everything that happened in a run.
///
/// Owned by the orchestrator; entries are never rewritten. Append order is the
/// tie-breaker for entries with equal timestamps.
#[derive(Debug)]
pub struct WorkLog {
    file: JsonlFile<WorkLogEntry>,
    appended: usize,
}

impl WorkLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonlFile::new(path),
            appended: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn append(&mut self, entry: WorkLogEntry) -> Result<()> {
        self.file.append(&entry)?;
        self.appended += 1;
        Ok(())
    }

    /// Number of entries appended through this handle
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Every entry on disk in append order
    pub fn entries(&self) -> Result<Vec<WorkLogEntry>> {
        self.file.load()
    }

    pub fn by_actor(&self, actor: &str) -> Result<Vec<WorkLogEntry>> {
        Ok(self.entries()?.into_iter().filter(|e| e.actor == actor).collect())
    }

    pub fn by_event(&self, event: &str) -> Result<Vec<WorkLogEntry>> {
        Ok(self.entries()?.into_iter().filter(|e| e.event == event).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_filter() {
        let temp = TempDir::new().unwrap();
        let mut log = WorkLog::open(temp.path().join("worklog.jsonl"));

        log.append(WorkLogEntry::run_started("run-1", "build")).unwrap();
        log.append(WorkLogEntry::new("planner", events::PR_FEEDBACK, json!({"task_id": "task-001"})))
            .unwrap();
        log.append(WorkLogEntry::run_completed(0, 0)).unwrap();

        assert_eq!(log.appended(), 3);
        assert_eq!(log.entries().unwrap().len(), 3);
        assert_eq!(log.by_actor("planner").unwrap().len(), 1);
        assert_eq!(log.by_event(events::RUN_COMPLETED).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("worklog.jsonl");
        WorkLog::open(&path).append(WorkLogEntry::run_started("run-1", "x")).unwrap();

        let mut log = WorkLog::open(&path);
        log.append(WorkLogEntry::run_resumed("run-1", 0)).unwrap();

        let names: Vec<String> = log.entries().unwrap().into_iter().map(|e| e.event).collect();
        assert_eq!(names, vec![events::RUN_STARTED, events::RUN_RESUMED]);
    }
}
