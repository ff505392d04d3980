//! Error types for Tandem
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Tandem
#[derive(Debug, Error)]
pub enum TandemError {
    /// Task not found in the plan
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Requirement could not be decomposed into tasks
    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    /// Message bus delivery error
    #[error("Bus error: {0}")]
    Bus(String),

    /// Snapshot or work log could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Code-generation backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Version-control collaborator error
    #[error("VCS error: {0}")]
    Vcs(String),

    /// Artifact path that would land outside its branch
    #[error("Unsafe path: {0}")]
    UnsafePath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Tandem operations
pub type Result<T> = std::result::Result<T, TandemError>;
