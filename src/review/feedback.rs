//! Structured feedback for rejected submissions.
//!
//! A rejected review yields a list of issues. Before they reach the executor
//! they are deduplicated and ordered by priority so the backend sees the most
//! important problems first.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::review::criterion::Criterion;

/// How urgently an issue should be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    High,
    Medium,
    Low,
}

impl IssuePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::High => "high",
            IssuePriority::Medium => "medium",
            IssuePriority::Low => "low",
        }
    }
}

impl std::fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single problem found during review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    /// Criterion that flagged the issue.
    pub criterion: Criterion,

    pub priority: IssuePriority,

    /// Human-readable description.
    pub message: String,

    /// File involved, if applicable.
    pub file: Option<String>,
}

impl Issue {
    pub fn new(criterion: Criterion, priority: IssuePriority, message: impl Into<String>) -> Self {
        Self {
            criterion,
            priority,
            message: message.into(),
            file: None,
        }
    }

    /// Set the file location.
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Prioritized, deduplicated issue list sent with `PR_FEEDBACK`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub issues: Vec<Issue>,
}

impl Feedback {
    /// Deduplicate by (criterion, message) and sort: priority first, then
    /// criterion, then original order.
    ///
    /// The first occurrence of a duplicate is kept, at the most urgent
    /// priority any copy carried.
    pub fn from_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        let mut seen: HashMap<(Criterion, String), usize> = HashMap::new();
        let mut unique: Vec<Issue> = Vec::new();
        for issue in issues {
            match seen.get(&(issue.criterion, issue.message.clone())) {
                Some(&i) => unique[i].priority = unique[i].priority.min(issue.priority),
                None => {
                    seen.insert((issue.criterion, issue.message.clone()), unique.len());
                    unique.push(issue);
                }
            }
        }
        unique.sort_by_key(|issue| (issue.priority, issue.criterion));
        Self { issues: unique }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues of a given priority.
    pub fn with_priority(&self, priority: IssuePriority) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.priority == priority)
    }
}

/// Formatter for incorporating feedback into backend prompts.
pub struct FeedbackFormatter {
    /// Maximum number of issues to show per criterion.
    pub max_issues_per_criterion: usize,
}

impl Default for FeedbackFormatter {
    fn default() -> Self {
        Self {
            max_issues_per_criterion: 10,
        }
    }
}

impl FeedbackFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_issues_per_criterion(mut self, max: usize) -> Self {
        self.max_issues_per_criterion = max;
        self
    }

    /// Render feedback as markdown, grouped by criterion in priority order.
    pub fn format(&self, feedback: &Feedback, iteration: u32) -> String {
        if feedback.is_empty() {
            return String::new();
        }

        let mut output = format!("## Review Feedback (iteration {})\n\n", iteration);

        let mut by_criterion: BTreeMap<Criterion, Vec<&Issue>> = BTreeMap::new();
        for issue in &feedback.issues {
            by_criterion.entry(issue.criterion).or_default().push(issue);
        }

        for (criterion, issues) in by_criterion {
            output.push_str(&format!("**{}**:\n", criterion));

            for issue in issues.iter().take(self.max_issues_per_criterion) {
                match &issue.file {
                    Some(file) => output.push_str(&format!("- [{}] {} ({})\n", issue.priority, issue.message, file)),
                    None => output.push_str(&format!("- [{}] {}\n", issue.priority, issue.message)),
                }
            }

            if issues.len() > self.max_issues_per_criterion {
                output.push_str(&format!(
                    "- ... and {} more {} issues\n",
                    issues.len() - self.max_issues_per_criterion,
                    criterion
                ));
            }

            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_builder() {
        let issue = Issue::new(Criterion::Quality, IssuePriority::Low, "line too long").in_file("src/lib.rs");
        assert_eq!(issue.file.as_deref(), Some("src/lib.rs"));
        assert_eq!(issue.priority, IssuePriority::Low);
    }

    #[test]
    fn test_from_issues_deduplicates() {
        let dup = Issue::new(Criterion::Testing, IssuePriority::High, "no tests found");
        let feedback = Feedback::from_issues(vec![dup.clone(), dup.clone(), dup]);
        assert_eq!(feedback.len(), 1);
    }

    #[test]
    fn test_from_issues_deduplicates_on_criterion_and_message() {
        let feedback = Feedback::from_issues(vec![
            Issue::new(Criterion::Quality, IssuePriority::Low, "line too long").in_file("src/a.rs"),
            Issue::new(Criterion::Quality, IssuePriority::Medium, "line too long").in_file("src/b.rs"),
            Issue::new(Criterion::Documentation, IssuePriority::Low, "line too long"),
        ]);

        assert_eq!(feedback.len(), 2);
        let quality = &feedback.issues[0];
        assert_eq!(quality.criterion, Criterion::Quality);
        assert_eq!(quality.priority, IssuePriority::Medium);
        assert_eq!(quality.file.as_deref(), Some("src/a.rs"));
        assert_eq!(feedback.issues[1].criterion, Criterion::Documentation);
    }

    #[test]
    fn test_from_issues_orders_by_priority() {
        let feedback = Feedback::from_issues(vec![
            Issue::new(Criterion::Quality, IssuePriority::Low, "long line"),
            Issue::new(Criterion::EdgeCases, IssuePriority::Medium, "no error handling"),
            Issue::new(Criterion::Functionality, IssuePriority::High, "criterion missing"),
            Issue::new(Criterion::Testing, IssuePriority::High, "no tests"),
        ]);
        let order: Vec<_> = feedback.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            order,
            vec!["criterion missing", "no tests", "no error handling", "long line"]
        );
    }

    #[test]
    fn test_with_priority_filter() {
        let feedback = Feedback::from_issues(vec![
            Issue::new(Criterion::Quality, IssuePriority::Low, "a"),
            Issue::new(Criterion::Testing, IssuePriority::High, "b"),
        ]);
        assert_eq!(feedback.with_priority(IssuePriority::High).count(), 1);
    }

    #[test]
    fn test_format_empty() {
        let formatter = FeedbackFormatter::new();
        assert!(formatter.format(&Feedback::default(), 1).is_empty());
    }

    #[test]
    fn test_format_groups_and_truncates() {
        let formatter = FeedbackFormatter::new().with_max_issues_per_criterion(2);
        let feedback = Feedback::from_issues(
            (0..4).map(|i| Issue::new(Criterion::Quality, IssuePriority::Low, format!("issue {}", i))),
        );
        let output = formatter.format(&feedback, 2);

        assert!(output.contains("iteration 2"));
        assert!(output.contains("**quality**"));
        assert!(output.contains("issue 0"));
        assert!(output.contains("issue 1"));
        assert!(!output.contains("issue 3"));
        assert!(output.contains("and 2 more quality issues"));
    }

    #[test]
    fn test_format_includes_file() {
        let feedback = Feedback::from_issues(vec![
            Issue::new(Criterion::Documentation, IssuePriority::Medium, "undocumented").in_file("src/api.rs"),
        ]);
        let output = FeedbackFormatter::new().format(&feedback, 1);
        assert!(output.contains("- [medium] undocumented (src/api.rs)"));
    }
}
