//! Review scoring
//!
//! A submission is judged on five weighted criteria. Each criterion has one
//! [`CriterionEvaluator`]; the [`ReviewScorer`] turns their percentages into
//! points and decides approval against the threshold.

pub mod criterion;
pub mod feedback;
pub mod heuristics;
pub mod scorer;

pub use criterion::{Assessment, Criterion, CriterionEvaluator};
pub use feedback::{Feedback, FeedbackFormatter, Issue, IssuePriority};
pub use heuristics::ReviewerProfile;
pub use scorer::{ReviewOutcome, ReviewScorer};
