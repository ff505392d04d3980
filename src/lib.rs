//! Tandem - a planner/executor agent pair
//!
//! A planner decomposes a requirement into tasks and reviews every submission
//! against weighted criteria; an executor turns tasks into reviewed artifacts
//! through a pluggable code-generation backend. Both talk only over an
//! in-process message bus owned by the orchestrator, which persists the run
//! after every step so it can be resumed.

pub mod agents;
pub mod backend;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod orchestrator;
pub mod review;
pub mod storage;
pub mod vcs;

pub use error::{Result, TandemError};
