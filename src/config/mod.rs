//! Configuration system for Tandem.
//!
//! A single YAML file with four sections: `run`, `backend`, `review` and
//! `vcs`. Every key has a default, so an empty file (or none) is valid.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{RunConfig, TandemConfig};

mod global;

/// Load and validate configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .tandem.yml in current directory (project config)
/// 3. ~/.config/tandem/tandem.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<TandemConfig> {
    let config = TandemConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
