//! Default heuristic evaluators
//!
//! These are text heuristics over the artifact's files. They are cheap and
//! deterministic, which is all the scoring gate needs; a stronger judge can be
//! plugged in per criterion through [`ReviewScorer::with_evaluator`].
//!
//! [`ReviewScorer::with_evaluator`]: crate::review::ReviewScorer::with_evaluator

use serde::{Deserialize, Serialize};

use crate::domain::{Artifact, Task};
use crate::review::criterion::{Assessment, Criterion, CriterionEvaluator};
use crate::review::feedback::{Issue, IssuePriority};

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "and", "been", "before", "each", "every", "from", "have", "into", "must", "should",
    "than", "that", "their", "them", "then", "there", "they", "this", "when", "where", "which", "while", "will",
    "with", "without",
];

const TEST_MARKERS: &[&str] = &["#[test]", "#[tokio::test]", "def test_", "it(\"", "test(\""];

const EDGE_CASE_MARKERS: &[&str] = &[
    "result<", "err(", "none", "match ", "if let", "invalid", "empty", "error", "except", "throw", "catch", "bound",
];

const DEBT_MARKERS: &[&str] = &["TODO", "FIXME", "XXX"];

/// Reviewer persona expressed as thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReviewerProfile {
    /// Share of a criterion's keywords that must appear for it to count as covered
    pub keyword_coverage_percent: u32,
    pub max_line_length: usize,
    pub max_file_lines: usize,
    /// Doc-comment lines as a share of non-blank source lines
    pub min_doc_percent: u32,
    pub min_tests_per_criterion: u32,
    pub edge_case_markers_required: u32,
}

impl Default for ReviewerProfile {
    fn default() -> Self {
        Self {
            keyword_coverage_percent: 50,
            max_line_length: 120,
            max_file_lines: 400,
            min_doc_percent: 10,
            min_tests_per_criterion: 1,
            edge_case_markers_required: 2,
        }
    }
}

impl ReviewerProfile {
    /// A stricter persona for security-sensitive work
    pub fn strict() -> Self {
        Self {
            keyword_coverage_percent: 75,
            max_line_length: 100,
            max_file_lines: 300,
            min_doc_percent: 20,
            min_tests_per_criterion: 2,
            edge_case_markers_required: 4,
        }
    }

    /// Build the five default evaluators for this profile
    pub fn evaluators(&self) -> Vec<Box<dyn CriterionEvaluator>> {
        vec![
            Box::new(FunctionalityHeuristic::new(self.clone())),
            Box::new(TestingHeuristic::new(self.clone())),
            Box::new(QualityHeuristic::new(self.clone())),
            Box::new(DocumentationHeuristic::new(self.clone())),
            Box::new(EdgeCaseHeuristic::new(self.clone())),
        ]
    }
}

fn keywords(text: &str) -> Vec<String> {
    let mut words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() >= 4 && !STOPWORDS.contains(&w.as_str()))
        .collect();
    words.dedup();
    words
}

fn is_markdown(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown") || lower.ends_with(".txt")
}

fn is_doc_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["///", "//!", "/**", "* ", "\"\"\"", "# ", "--- "]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Acceptance-criteria keyword coverage
pub struct FunctionalityHeuristic {
    profile: ReviewerProfile,
}

impl FunctionalityHeuristic {
    pub fn new(profile: ReviewerProfile) -> Self {
        Self { profile }
    }

    fn covers(&self, text: &str, criterion: &str) -> bool {
        let words = keywords(criterion);
        if words.is_empty() {
            return true;
        }
        let found = words.iter().filter(|w| text.contains(w.as_str())).count();
        found as u32 * 100 >= self.profile.keyword_coverage_percent * words.len() as u32
    }
}

impl CriterionEvaluator for FunctionalityHeuristic {
    fn criterion(&self) -> Criterion {
        Criterion::Functionality
    }

    fn evaluate(&self, task: &Task, artifact: &Artifact) -> Assessment {
        if artifact.is_empty() {
            return Assessment::new(
                0,
                vec![Issue::new(
                    Criterion::Functionality,
                    IssuePriority::High,
                    "submission contains no code",
                )],
            );
        }
        if task.acceptance_criteria.is_empty() {
            return Assessment::full();
        }

        let text = artifact.text().to_lowercase();
        let issues: Vec<Issue> = task
            .acceptance_criteria
            .iter()
            .filter(|c| !self.covers(&text, c))
            .map(|c| {
                Issue::new(
                    Criterion::Functionality,
                    IssuePriority::High,
                    format!("acceptance criterion not addressed: {}", c),
                )
            })
            .collect();

        let total = task.acceptance_criteria.len() as u32;
        let covered = total - issues.len() as u32;
        Assessment::new(covered * 100 / total, issues)
    }

    fn description(&self) -> &str {
        "acceptance criteria keyword coverage"
    }
}

/// Test presence relative to the number of acceptance criteria
pub struct TestingHeuristic {
    profile: ReviewerProfile,
}

impl TestingHeuristic {
    pub fn new(profile: ReviewerProfile) -> Self {
        Self { profile }
    }
}

impl CriterionEvaluator for TestingHeuristic {
    fn criterion(&self) -> Criterion {
        Criterion::Testing
    }

    fn evaluate(&self, task: &Task, artifact: &Artifact) -> Assessment {
        let found: u32 = artifact
            .files
            .iter()
            .map(|f| {
                TEST_MARKERS
                    .iter()
                    .map(|m| f.content.matches(m).count() as u32)
                    .sum::<u32>()
            })
            .sum();
        let required = (task.acceptance_criteria.len() as u32)
            .saturating_mul(self.profile.min_tests_per_criterion)
            .max(1);

        let mut issues = Vec::new();
        if found == 0 {
            issues.push(Issue::new(Criterion::Testing, IssuePriority::High, "no tests found"));
        } else if found < required {
            issues.push(Issue::new(
                Criterion::Testing,
                IssuePriority::Medium,
                format!("found {} tests, expected at least {}", found, required),
            ));
        }
        if found > 0 && !artifact.files.iter().any(|f| f.is_test_file()) && !artifact.text().contains("mod tests") {
            issues.push(Issue::new(
                Criterion::Testing,
                IssuePriority::Low,
                "tests are not in a dedicated test module or file",
            ));
        }

        Assessment::new(found.saturating_mul(100) / required, issues)
    }

    fn description(&self) -> &str {
        "test count per acceptance criterion"
    }
}

/// Line length, debt markers and file size
pub struct QualityHeuristic {
    profile: ReviewerProfile,
}

impl QualityHeuristic {
    pub fn new(profile: ReviewerProfile) -> Self {
        Self { profile }
    }
}

impl CriterionEvaluator for QualityHeuristic {
    fn criterion(&self) -> Criterion {
        Criterion::Quality
    }

    fn evaluate(&self, _task: &Task, artifact: &Artifact) -> Assessment {
        if artifact.is_empty() {
            return Assessment::new(0, Vec::new());
        }

        let mut long_line_penalty = 0u32;
        let mut debt_penalty = 0u32;
        let mut size_penalty = 0u32;
        let mut issues = Vec::new();

        for file in &artifact.files {
            let long = file
                .content
                .lines()
                .filter(|l| l.chars().count() > self.profile.max_line_length)
                .count() as u32;
            if long > 0 {
                long_line_penalty += long * 2;
                issues.push(
                    Issue::new(
                        Criterion::Quality,
                        IssuePriority::Low,
                        format!("{} lines exceed {} characters", long, self.profile.max_line_length),
                    )
                    .in_file(&file.path),
                );
            }

            let debt: u32 = DEBT_MARKERS.iter().map(|m| file.content.matches(m).count() as u32).sum();
            if debt > 0 {
                debt_penalty += debt * 10;
                issues.push(
                    Issue::new(
                        Criterion::Quality,
                        IssuePriority::Medium,
                        format!("{} unresolved debt markers", debt),
                    )
                    .in_file(&file.path),
                );
            }

            let lines = file.content.lines().count();
            if lines > self.profile.max_file_lines {
                size_penalty += 20;
                issues.push(
                    Issue::new(
                        Criterion::Quality,
                        IssuePriority::Medium,
                        format!("file has {} lines, limit is {}", lines, self.profile.max_file_lines),
                    )
                    .in_file(&file.path),
                );
            }
        }

        let penalty = long_line_penalty.min(30) + debt_penalty.min(40) + size_penalty.min(40);
        Assessment::new(100u32.saturating_sub(penalty), issues)
    }

    fn description(&self) -> &str {
        "line length, debt markers and file size"
    }
}

/// README presence and doc-comment density
pub struct DocumentationHeuristic {
    profile: ReviewerProfile,
}

impl DocumentationHeuristic {
    pub fn new(profile: ReviewerProfile) -> Self {
        Self { profile }
    }
}

impl CriterionEvaluator for DocumentationHeuristic {
    fn criterion(&self) -> Criterion {
        Criterion::Documentation
    }

    fn evaluate(&self, _task: &Task, artifact: &Artifact) -> Assessment {
        let mut issues = Vec::new();
        let mut percent = 0;

        if artifact.files.iter().any(|f| f.is_readme()) {
            percent += 40;
        } else {
            issues.push(Issue::new(
                Criterion::Documentation,
                IssuePriority::Medium,
                "no README describing the change",
            ));
        }

        let (doc_lines, code_lines) = artifact
            .files
            .iter()
            .filter(|f| !is_markdown(&f.path))
            .flat_map(|f| f.content.lines())
            .filter(|l| !l.trim().is_empty())
            .fold((0u32, 0u32), |(doc, all), line| (doc + is_doc_line(line) as u32, all + 1));

        if code_lines == 0 {
            issues.push(Issue::new(
                Criterion::Documentation,
                IssuePriority::Low,
                "no source files to document",
            ));
        } else {
            let density = doc_lines * 100 / code_lines;
            let min = self.profile.min_doc_percent.max(1);
            if density >= min {
                percent += 60;
            } else {
                percent += 60 * density / min;
                issues.push(Issue::new(
                    Criterion::Documentation,
                    IssuePriority::Low,
                    format!("doc comments cover {}% of lines, expected {}%", density, min),
                ));
            }
        }

        Assessment::new(percent, issues)
    }

    fn description(&self) -> &str {
        "readme and doc comment density"
    }
}

/// Error-handling and boundary markers
pub struct EdgeCaseHeuristic {
    profile: ReviewerProfile,
}

impl EdgeCaseHeuristic {
    pub fn new(profile: ReviewerProfile) -> Self {
        Self { profile }
    }
}

impl CriterionEvaluator for EdgeCaseHeuristic {
    fn criterion(&self) -> Criterion {
        Criterion::EdgeCases
    }

    fn evaluate(&self, _task: &Task, artifact: &Artifact) -> Assessment {
        let text = artifact.text().to_lowercase();
        let found = EDGE_CASE_MARKERS.iter().filter(|m| text.contains(*m)).count() as u32;
        let required = self.profile.edge_case_markers_required.max(1);

        let issues = if found < required {
            vec![Issue::new(
                Criterion::EdgeCases,
                IssuePriority::Medium,
                format!(
                    "error handling is thin: found {} of {} expected edge-case markers",
                    found, required
                ),
            )]
        } else {
            Vec::new()
        };

        Assessment::new(found * 100 / required, issues)
    }

    fn description(&self) -> &str {
        "error handling markers"
    }
}
