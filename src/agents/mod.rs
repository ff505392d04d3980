//! The two cooperating agents.
//!
//! Each agent owns its inbox and runs as its own tokio task. Agents talk only
//! through the [`MessageBus`](crate::bus::MessageBus); neither ever returns an
//! error across it. Failures become `AGENT_ERROR` messages and malformed input
//! is logged and dropped.

pub mod decomposer;
pub mod executor;
pub mod planner;

pub use decomposer::{Decomposer, TemplateDecomposer};
pub use executor::ExecutorAgent;
pub use planner::{PlannerAgent, PlannerContext};

/// Bus id of the planning/review agent
pub const PLANNER: &str = "planner";
/// Bus id of the execution agent
pub const EXECUTOR: &str = "executor";
/// Bus id of the orchestrator's observer tap
pub const ORCHESTRATOR: &str = "orchestrator";
