//! Terminal rendering of runs, summaries and work logs.

use colored::*;

use tandem::domain::{ProjectState, RunStatus, RunSummary, TaskOutcome, TaskStatus, WorkLogEntry};

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => status.as_str().green(),
        RunStatus::Failed => status.as_str().red(),
        _ => status.as_str().yellow(),
    }
}

fn task_label(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Completed => status.as_str().green(),
        TaskStatus::Escalated => status.as_str().yellow(),
        TaskStatus::Failed => status.as_str().red(),
        _ => status.as_str().normal(),
    }
}

fn outcome_line(outcome: &TaskOutcome) -> String {
    let score = outcome
        .final_score
        .as_ref()
        .map(|s| format!("{}/100", s.total))
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "  {} {} (iterations: {}, score: {})",
        outcome.task_id, outcome.description, outcome.iteration_count, score
    );
    if let Some(reason) = &outcome.reason {
        line.push_str(&format!(": {}", reason));
    }
    line
}

pub fn summary(summary: &RunSummary) -> String {
    let mut out = vec![format!("{} {}", summary.run_id.bold(), status_label(summary.status))];

    if let Some(reason) = &summary.failure_reason {
        out.push(format!("{} {}", "Reason:".red(), reason));
    }
    if !summary.completed.is_empty() {
        out.push(format!("{} ({})", "Completed".green(), summary.completed.len()));
        out.extend(summary.completed.iter().map(outcome_line));
    }
    if !summary.escalated.is_empty() {
        out.push(format!("{} ({})", "Escalated".yellow(), summary.escalated.len()));
        out.extend(summary.escalated.iter().map(outcome_line));
    }
    if !summary.failed.is_empty() {
        out.push(format!("{} ({})", "Failed".red(), summary.failed.len()));
        out.extend(summary.failed.iter().map(outcome_line));
    }
    if let Some(reference) = &summary.improvement_artifact {
        out.push(format!("{} {}", "Improvement:".cyan(), reference));
    }
    if summary.needs_attention() {
        out.push(format!("{}", "Some tasks need attention".yellow()));
    }
    out.join("\n")
}

pub fn state(state: &ProjectState, detailed: bool) -> String {
    let mut out = vec![
        format!("{} {}", state.run_id.bold(), status_label(state.status)),
        format!("Requirement: {}", state.requirement),
    ];
    for (i, task) in state.tasks.iter().enumerate() {
        let marker = if i == state.current_index && !state.status.is_terminal() {
            ">"
        } else {
            " "
        };
        out.push(format!(
            "{} {} [{}] {} (iterations: {})",
            marker,
            task.id,
            task_label(task.status),
            task.description,
            task.iteration_count
        ));
        if detailed {
            for (n, score) in task.scores.iter().enumerate() {
                let parts: Vec<String> = score.criteria.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                out.push(format!("      #{} {} [{}]", n + 1, score, parts.join(", ")));
            }
            if let Some(reference) = &task.last_artifact {
                out.push(format!("      last artifact: {}", reference));
            }
        }
    }
    if let Some(reason) = &state.failure_reason {
        out.push(format!("{} {}", "Reason:".red(), reason));
    }
    out.join("\n")
}

pub fn list_line(state: &ProjectState) -> String {
    let done = state.tasks.iter().filter(|t| t.is_terminal()).count();
    format!(
        "{} {} {}/{} tasks  {}",
        state.run_id,
        status_label(state.status),
        done,
        state.tasks.len(),
        first_line(&state.requirement)
    )
}

pub fn log_line(entry: &WorkLogEntry) -> String {
    format!(
        "{} {:<12} {:<24} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.actor.cyan(),
        entry.event,
        entry.detail
    )
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
