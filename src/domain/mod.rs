//! Domain types for Tandem
//!
//! - Task: one decomposed unit of work and its review transitions
//! - Artifact: what the backend produced for a task
//! - ReviewScore: weighted score for one submission
//! - Message: typed envelope exchanged between agents
//! - ProjectState: the persisted aggregate root
//! - WorkLogEntry: append-only audit records

pub mod artifact;
pub mod message;
pub mod project;
pub mod score;
pub mod task;
pub mod worklog;

pub use artifact::{Artifact, ArtifactFile};
pub use message::{CompletionOutcome, Message, MessageType, Payload};
pub use project::{ProjectState, RunStatus, RunSummary, TaskOutcome};
pub use score::{APPROVAL_THRESHOLD, ReviewScore};
pub use task::{MAX_ITERATIONS, ReviewDecision, Task, TaskStatus};
pub use worklog::{WorkLogEntry, events};
