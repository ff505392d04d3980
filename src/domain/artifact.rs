//! Artifacts produced by the backend

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub content: String,
}

impl ArtifactFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// True for files that look like tests by path
    pub fn is_test_file(&self) -> bool {
        let path = self.path.to_lowercase();
        path.contains("test") || path.contains("spec")
    }

    /// True for README-style documentation files
    pub fn is_readme(&self) -> bool {
        self.path
            .rsplit('/')
            .next()
            .is_some_and(|name| name.to_lowercase().starts_with("readme"))
    }
}

/// Output of one backend invocation, plus the review handle once opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Review handle id; empty until a review is opened
    #[serde(default)]
    pub reference: String,
    /// Task this artifact belongs to (None for the improvement pass)
    pub task_id: Option<String>,
    /// 0 for a fresh generation, incremented on every revision
    pub revision: u32,
    /// Backend's own description of the change
    pub summary: String,
    pub files: Vec<ArtifactFile>,
}

impl Artifact {
    pub fn new(task_id: Option<String>, summary: impl Into<String>, files: Vec<ArtifactFile>) -> Self {
        Self {
            reference: String::new(),
            task_id,
            revision: 0,
            summary: summary.into(),
            files,
        }
    }

    /// Set the revision number
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Attach the review handle
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.content.trim().is_empty())
    }

    /// All file contents joined, for text heuristics
    pub fn text(&self) -> String {
        self.files
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SHA-256 over paths and contents, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.path.as_bytes());
            hasher.update([0u8]);
            hasher.update(file.content.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}
