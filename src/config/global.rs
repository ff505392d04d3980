//! Tandem configuration file.
//!
//! Loaded from `--config`, `.tandem.yml` or `~/.config/tandem/tandem.yml`.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::BackendConfig;
use crate::domain::MAX_ITERATIONS;
use crate::review::ReviewerProfile;
use crate::vcs::VcsConfig;

/// Longest accepted wall-clock budget (one week)
pub const MAX_BUDGET_SECS: u64 = 7 * 24 * 3600;

/// Upper bound for count-style reviewer thresholds
const MAX_REVIEW_COUNT: u32 = 100;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TandemConfig {
    /// Run limits and storage.
    pub run: RunConfig,

    /// Code-generation backend.
    pub backend: BackendConfig,

    /// Reviewer thresholds.
    pub review: ReviewerProfile,

    /// Where branches and reviews go.
    pub vcs: VcsConfig,
}

impl TandemConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .tandem.yml in current directory
    /// 3. ~/.config/tandem/tandem.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".tandem.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .tandem.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .tandem.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tandem").join("tandem.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.run.max_tasks == 0 {
            eyre::bail!("run.max-tasks must be > 0");
        }
        if self.run.max_iterations == 0 || self.run.max_iterations > MAX_ITERATIONS {
            eyre::bail!("run.max-iterations must be between 1 and {}", MAX_ITERATIONS);
        }
        if self.run.budget_secs == 0 || self.run.budget_secs > MAX_BUDGET_SECS {
            eyre::bail!("run.budget-secs must be between 1 and {}", MAX_BUDGET_SECS);
        }
        if self.run.bus_capacity == 0 {
            eyre::bail!("run.bus-capacity must be > 0");
        }
        if self.backend.timeout().is_zero() {
            eyre::bail!("backend.timeout-secs must be > 0");
        }
        if let BackendConfig::Command { program, .. } = &self.backend
            && program.trim().is_empty()
        {
            eyre::bail!("backend.program must not be empty");
        }
        if self.review.keyword_coverage_percent > 100 {
            eyre::bail!("review.keyword-coverage-percent must be <= 100");
        }
        if self.review.min_doc_percent > 100 {
            eyre::bail!("review.min-doc-percent must be <= 100");
        }
        if self.review.min_tests_per_criterion > MAX_REVIEW_COUNT {
            eyre::bail!("review.min-tests-per-criterion must be <= {}", MAX_REVIEW_COUNT);
        }
        if self.review.edge_case_markers_required > MAX_REVIEW_COUNT {
            eyre::bail!("review.edge-case-markers-required must be <= {}", MAX_REVIEW_COUNT);
        }
        if self.review.max_line_length == 0 || self.review.max_file_lines == 0 {
            eyre::bail!("review.max-line-length and review.max-file-lines must be > 0");
        }
        Ok(())
    }
}

/// Limits for a single run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Upper bound on decomposed tasks.
    pub max_tasks: usize,

    /// Rejections before a task is escalated (at most 3).
    pub max_iterations: u32,

    /// Re-sends of a failed backend command before the task fails.
    pub max_backend_retries: u32,

    /// Wall-clock budget per run in seconds.
    pub budget_secs: u64,

    /// Inbox capacity per agent.
    pub bus_capacity: usize,

    /// Where run snapshots and work logs live.
    pub runs_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_tasks: 10,
            max_iterations: MAX_ITERATIONS,
            max_backend_retries: 2,
            budget_secs: 3600,
            bus_capacity: crate::bus::DEFAULT_CAPACITY,
            runs_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tandem")
                .join("runs"),
        }
    }
}
