//! ID generation utilities for Tandem
//!
//! Provides functions for generating identifiers for runs, tasks and messages.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a unique run ID
///
/// Format: `run-{timestamp_ms}-{random_hex}`
/// Example: `run-1738300800123-a1b2`
pub fn generate_run_id() -> String {
    let random: u16 = rand::rng().random();
    format!("run-{}-{:04x}", now_ms(), random)
}

/// Generate a task ID from its position in the plan
///
/// Format: `task-{index:03}` (1-based)
pub fn generate_task_id(index: usize) -> String {
    format!("task-{:03}", index + 1)
}

/// Generate a message ID
///
/// Format: `msg-{timestamp_ms}-{random_hex}`
pub fn generate_message_id() -> String {
    let random: u32 = rand::rng().random();
    format!("msg-{}-{:08x}", now_ms(), random)
}

/// Branch name used for a task's review
pub fn branch_name(run_id: &str, task_id: &str) -> String {
    format!("tandem/{}/{}", run_id, task_id)
}
