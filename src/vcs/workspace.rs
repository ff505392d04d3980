//! Directory-backed version control.
//!
//! Layout under the workspace root:
//!
//! ```text
//! branches/<branch>/...          working files of each branch
//! meta/<branch-key>/commits.jsonl one line per commit
//! reviews/<review-id>.json       opened reviews
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::ArtifactFile;
use crate::error::{Result, TandemError};
use crate::vcs::{ReviewHandle, VersionControl, check_relative};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitLine {
    id: String,
    message: String,
    paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewFile {
    handle: ReviewHandle,
    description: String,
}

/// Branches materialized as directories
#[derive(Debug, Clone)]
pub struct WorkspaceVcs {
    root: PathBuf,
}

impl WorkspaceVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of a branch
    pub fn branch_path(&self, branch: &str) -> Result<PathBuf> {
        check_relative(branch)?;
        Ok(self.root.join("branches").join(branch))
    }

    fn commits_path(&self, branch: &str) -> PathBuf {
        self.root.join("meta").join(branch.replace('/', "__")).join("commits.jsonl")
    }

    fn reviews_dir(&self) -> PathBuf {
        self.root.join("reviews")
    }

    async fn head(&self, branch: &str) -> Result<Option<String>> {
        let path = self.commits_path(branch);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        match content.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => {
                let commit: CommitLine = serde_json::from_str(line)?;
                Ok(Some(commit.id))
            }
            None => Ok(None),
        }
    }
}

fn commit_id(branch: &str, files: &[ArtifactFile], message: &str, parent: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(branch.as_bytes());
    hasher.update([0u8]);
    hasher.update(parent.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(message.as_bytes());
    for file in files {
        hasher.update([0u8]);
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.content.as_bytes());
    }
    hex::encode(hasher.finalize())[..12].to_string()
}

#[async_trait]
impl VersionControl for WorkspaceVcs {
    async fn create_branch(&self, name: &str) -> Result<()> {
        let path = self.branch_path(name)?;
        fs::create_dir_all(&path).await?;
        debug!("WorkspaceVcs: branch {} at {}", name, path.display());
        Ok(())
    }

    async fn commit(&self, branch: &str, files: &[ArtifactFile], message: &str) -> Result<String> {
        let branch_dir = self.branch_path(branch)?;
        if !fs::try_exists(&branch_dir).await? {
            return Err(TandemError::Vcs(format!("no such branch: {}", branch)));
        }

        for file in files {
            check_relative(&file.path)?;
            let target = branch_dir.join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&target, &file.content).await?;
        }

        let parent = self.head(branch).await?;
        let id = commit_id(branch, files, message, parent.as_deref());
        let line = CommitLine {
            id: id.clone(),
            message: message.to_string(),
            paths: files.iter().map(|f| f.path.clone()).collect(),
        };

        let log_path = self.commits_path(branch);
        if let Some(dir) = log_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut log = fs::OpenOptions::new().create(true).append(true).open(&log_path).await?;
        log.write_all(format!("{}\n", serde_json::to_string(&line)?).as_bytes()).await?;
        log.flush().await?;

        debug!("WorkspaceVcs: commit {} on {}", id, branch);
        Ok(id)
    }

    async fn open_review(&self, branch: &str, description: &str) -> Result<ReviewHandle> {
        let commit = self
            .head(branch)
            .await?
            .ok_or_else(|| TandemError::Vcs(format!("nothing committed on {}", branch)))?;

        let dir = self.reviews_dir();
        fs::create_dir_all(&dir).await?;
        let mut seq = 1;
        let mut entries = fs::read_dir(&dir).await?;
        while entries.next_entry().await?.is_some() {
            seq += 1;
        }

        let handle = ReviewHandle {
            id: format!("review-{:04}-{}", seq, &commit[..8]),
            branch: branch.to_string(),
            commit,
        };
        let record = ReviewFile {
            handle: handle.clone(),
            description: description.to_string(),
        };
        fs::write(dir.join(format!("{}.json", handle.id)), serde_json::to_string_pretty(&record)?).await?;

        debug!("WorkspaceVcs: opened {} for {}", handle.id, branch);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_commit_writes_files_and_log() {
        let temp = TempDir::new().unwrap();
        let vcs = WorkspaceVcs::new(temp.path());
        let branch = "tandem/run-1/task-001";

        vcs.create_branch(branch).await.unwrap();
        let first = vcs
            .commit(branch, &[ArtifactFile::new("src/lib.rs", "pub fn a() {}")], "first")
            .await
            .unwrap();
        let second = vcs
            .commit(branch, &[ArtifactFile::new("src/lib.rs", "pub fn a() {}")], "first")
            .await
            .unwrap();

        let written = std::fs::read_to_string(temp.path().join("branches").join(branch).join("src/lib.rs")).unwrap();
        assert_eq!(written, "pub fn a() {}");
        assert_eq!(first.len(), 12);
        assert_ne!(first, second, "parent commit is part of the id");
    }

    #[tokio::test]
    async fn test_open_review_embeds_commit() {
        let temp = TempDir::new().unwrap();
        let vcs = WorkspaceVcs::new(temp.path());

        vcs.create_branch("b").await.unwrap();
        let commit = vcs.commit("b", &[ArtifactFile::new("a.rs", "x")], "m").await.unwrap();
        let one = vcs.open_review("b", "first").await.unwrap();
        let two = vcs.open_review("b", "again").await.unwrap();

        assert_eq!(one.commit, commit);
        assert!(one.id.starts_with("review-0001-"));
        assert!(one.id.ends_with(&commit[..8]));
        assert!(two.id.starts_with("review-0002-"));
        assert!(temp.path().join("reviews").join(format!("{}.json", one.id)).exists());
    }

    #[tokio::test]
    async fn test_commit_requires_branch() {
        let temp = TempDir::new().unwrap();
        let vcs = WorkspaceVcs::new(temp.path());
        let result = vcs.commit("missing", &[ArtifactFile::new("a.rs", "x")], "m").await;
        assert!(matches!(result, Err(TandemError::Vcs(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let vcs = WorkspaceVcs::new(temp.path());
        vcs.create_branch("b").await.unwrap();
        let result = vcs.commit("b", &[ArtifactFile::new("../../etc/x", "x")], "m").await;
        assert!(result.is_err());
        assert!(vcs.create_branch("../outside").await.is_err());
    }
}
