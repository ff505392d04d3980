//! Version-control collaborator
//!
//! The executor creates a branch per task, commits each artifact to it and
//! opens a review. Only the review handle's id leaves this module; it becomes
//! the artifact reference.

pub mod memory;
pub mod workspace;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ArtifactFile;
use crate::error::{Result, TandemError};

pub use memory::MemoryVcs;
pub use workspace::WorkspaceVcs;

/// An opened review (pull request)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewHandle {
    pub id: String,
    pub branch: String,
    pub commit: String,
}

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create `name` if it does not exist yet. Idempotent.
    async fn create_branch(&self, name: &str) -> Result<()>;

    /// Record `files` on `branch`, returning the commit id
    async fn commit(&self, branch: &str, files: &[ArtifactFile], message: &str) -> Result<String>;

    /// Open a review for the branch head
    async fn open_review(&self, branch: &str, description: &str) -> Result<ReviewHandle>;
}

/// Reject paths that would escape the branch directory
pub(crate) fn check_relative(path: &str) -> Result<()> {
    let p = std::path::Path::new(path);
    let escapes = p.is_absolute()
        || p.components().any(|c| {
            matches!(
                c,
                std::path::Component::ParentDir | std::path::Component::RootDir | std::path::Component::Prefix(_)
            )
        });
    if path.is_empty() || escapes {
        return Err(TandemError::UnsafePath(format!("refusing path outside the branch: {:?}", path)));
    }
    Ok(())
}

/// Which version-control implementation to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VcsConfig {
    /// Branches as directories under `root`
    Workspace { root: PathBuf },
    /// Nothing leaves the process
    Memory,
}

impl Default for VcsConfig {
    fn default() -> Self {
        VcsConfig::Workspace {
            root: PathBuf::from(".tandem/workspace"),
        }
    }
}

impl VcsConfig {
    pub fn build(&self) -> Box<dyn VersionControl> {
        match self {
            VcsConfig::Workspace { root } => Box::new(WorkspaceVcs::new(root.clone())),
            VcsConfig::Memory => Box::new(MemoryVcs::new()),
        }
    }
}
