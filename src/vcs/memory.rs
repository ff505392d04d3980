//! In-memory version control, for tests and dry runs

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ArtifactFile;
use crate::error::{Result, TandemError};
use crate::vcs::{ReviewHandle, VersionControl, check_relative};

/// A recorded commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub message: String,
    pub files: Vec<ArtifactFile>,
}

#[derive(Debug, Default)]
struct State {
    branches: BTreeMap<String, Vec<CommitRecord>>,
    reviews: Vec<(ReviewHandle, String)>,
    commit_seq: u64,
}

/// Records branches, commits and reviews without touching disk
#[derive(Debug, Default)]
pub struct MemoryVcs {
    state: Mutex<State>,
}

impl MemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state.lock().map_err(|e| TandemError::Vcs(e.to_string()))
    }

    pub fn branches(&self) -> Vec<String> {
        self.lock().map(|s| s.branches.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn commits(&self, branch: &str) -> Vec<CommitRecord> {
        self.lock()
            .ok()
            .and_then(|s| s.branches.get(branch).cloned())
            .unwrap_or_default()
    }

    /// Opened reviews with their descriptions, oldest first
    pub fn reviews(&self) -> Vec<(ReviewHandle, String)> {
        self.lock().map(|s| s.reviews.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VersionControl for MemoryVcs {
    async fn create_branch(&self, name: &str) -> Result<()> {
        self.lock()?.branches.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn commit(&self, branch: &str, files: &[ArtifactFile], message: &str) -> Result<String> {
        for file in files {
            check_relative(&file.path)?;
        }
        let mut state = self.lock()?;
        state.commit_seq += 1;
        let id = format!("commit-{}", state.commit_seq);
        let commits = state
            .branches
            .get_mut(branch)
            .ok_or_else(|| TandemError::Vcs(format!("no such branch: {}", branch)))?;
        commits.push(CommitRecord {
            id: id.clone(),
            message: message.to_string(),
            files: files.to_vec(),
        });
        Ok(id)
    }

    async fn open_review(&self, branch: &str, description: &str) -> Result<ReviewHandle> {
        let mut state = self.lock()?;
        let commit = state
            .branches
            .get(branch)
            .and_then(|c| c.last())
            .map(|c| c.id.clone())
            .ok_or_else(|| TandemError::Vcs(format!("nothing committed on {}", branch)))?;
        let handle = ReviewHandle {
            id: format!("review-{}", state.reviews.len() + 1),
            branch: branch.to_string(),
            commit,
        };
        state.reviews.push((handle.clone(), description.to_string()));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_branch_commit_review() {
        let vcs = MemoryVcs::new();
        vcs.create_branch("tandem/run-1/task-001").await.unwrap();
        vcs.create_branch("tandem/run-1/task-001").await.unwrap();
        assert_eq!(vcs.branches().len(), 1);

        let commit = vcs
            .commit("tandem/run-1/task-001", &[ArtifactFile::new("a.rs", "x")], "first")
            .await
            .unwrap();
        let review = vcs.open_review("tandem/run-1/task-001", "add a").await.unwrap();

        assert_eq!(review.id, "review-1");
        assert_eq!(review.commit, commit);
        assert_eq!(vcs.commits("tandem/run-1/task-001").len(), 1);
        assert_eq!(vcs.reviews()[0].1, "add a");
    }

    #[tokio::test]
    async fn test_commit_to_missing_branch_fails() {
        let vcs = MemoryVcs::new();
        let result = vcs.commit("nope", &[ArtifactFile::new("a.rs", "x")], "m").await;
        assert!(matches!(result, Err(TandemError::Vcs(_))));
    }

    #[tokio::test]
    async fn test_review_without_commit_fails() {
        let vcs = MemoryVcs::new();
        vcs.create_branch("b").await.unwrap();
        assert!(vcs.open_review("b", "empty").await.is_err());
    }
}
