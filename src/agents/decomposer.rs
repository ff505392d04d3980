//! Requirement decomposition strategies

use async_trait::async_trait;
use log::debug;

use crate::domain::Task;
use crate::error::{Result, TandemError};

/// Criterion every decomposed task carries
pub const TESTING_CRITERION: &str = "Includes automated tests for the new behavior";

/// Turns a requirement into an ordered task list.
///
/// Contract: between 1 and `max_tasks` tasks, each with at least one
/// acceptance criterion. An empty requirement is an error.
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, requirement: &str, max_tasks: usize, backend: &str) -> Result<Vec<Task>>;
}

/// Splits list items (or, failing that, sentences) into tasks
#[derive(Debug, Default, Clone)]
pub struct TemplateDecomposer;

impl TemplateDecomposer {
    pub fn new() -> Self {
        Self
    }

    fn list_item(line: &str) -> Option<&str> {
        let line = line.trim();
        for marker in ["- ", "* ", "+ "] {
            if let Some(rest) = line.strip_prefix(marker) {
                return Some(rest.trim());
            }
        }
        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            let rest = &line[digits..];
            if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
                return Some(rest.trim());
            }
        }
        None
    }

    fn sentences(text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let ends = matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|next| next.is_whitespace());
            if ends {
                let sentence = current.trim().trim_end_matches(['.', '!', '?']).trim().to_string();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                current.clear();
            }
        }
        let tail = current.trim();
        if !tail.is_empty() {
            out.push(tail.to_string());
        }
        out
    }

    /// Units of work in requirement order
    pub fn items(requirement: &str) -> Vec<String> {
        let listed: Vec<String> = requirement
            .lines()
            .filter_map(Self::list_item)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        Self::sentences(&requirement.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[async_trait]
impl Decomposer for TemplateDecomposer {
    async fn decompose(&self, requirement: &str, max_tasks: usize, backend: &str) -> Result<Vec<Task>> {
        if requirement.trim().is_empty() {
            return Err(TandemError::Decomposition("requirement is empty".to_string()));
        }
        if max_tasks == 0 {
            return Err(TandemError::Decomposition("max tasks must be at least 1".to_string()));
        }

        let mut items = Self::items(requirement);
        if items.is_empty() {
            return Err(TandemError::Decomposition("requirement has no actionable content".to_string()));
        }

        // Anything past the cap folds into the last task
        let overflow = if items.len() > max_tasks {
            items.split_off(max_tasks)
        } else {
            Vec::new()
        };

        let last = items.len() - 1;
        let tasks: Vec<Task> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let mut criteria = vec![item.clone()];
                if i == last {
                    criteria.extend(overflow.iter().cloned());
                }
                criteria.push(TESTING_CRITERION.to_string());
                Task::new(i, item, criteria, backend)
            })
            .collect();

        debug!("Decomposed requirement into {} tasks", tasks.len());
        Ok(tasks)
    }
}
