//! CLI command definitions using clap.
//!
//! - run: decompose a requirement and drive it to completion
//! - resume: continue an interrupted run
//! - status: show a run's tasks and scores
//! - log: replay a run's work log
//! - list: list all runs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tandem - a planner/executor agent pair with a review loop
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run for a requirement
    Run {
        /// Requirement text (bullets or numbered lines become separate tasks)
        requirement: String,

        /// Override run.max-tasks
        #[arg(short, long)]
        max_tasks: Option<usize>,
    },

    /// Resume an interrupted run from its last snapshot
    Resume {
        /// Run ID to resume
        run_id: String,
    },

    /// Show the state of a run
    Status {
        /// Run ID to show
        run_id: String,

        /// Show per-criterion points for each task
        #[arg(short, long)]
        detailed: bool,
    },

    /// Print a run's work log
    Log {
        /// Run ID whose log to print
        run_id: String,

        /// Only entries from this actor (planner, executor, orchestrator)
        #[arg(short, long)]
        actor: Option<String>,
    },

    /// List runs, newest first
    List {
        /// Only runs that have not reached a terminal state
        #[arg(short, long)]
        interrupted: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["tandem"]).is_err());
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::try_parse_from(["tandem", "run", "Build a parser"]).unwrap();
        match cli.command {
            Commands::Run { requirement, max_tasks } => {
                assert_eq!(requirement, "Build a parser");
                assert!(max_tasks.is_none());
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_with_max_tasks() {
        let cli = Cli::try_parse_from(["tandem", "run", "x", "-m", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { max_tasks: Some(3), .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tandem", "list", "-v", "-c", "/tmp/t.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.yml")));
        assert!(matches!(cli.command, Commands::List { interrupted: false }));
    }

    #[test]
    fn test_resume_command() {
        let cli = Cli::try_parse_from(["tandem", "resume", "run-1"]).unwrap();
        match cli.command {
            Commands::Resume { run_id } => assert_eq!(run_id, "run-1"),
            _ => panic!("Expected resume command"),
        }
    }

    #[test]
    fn test_status_detailed() {
        let cli = Cli::try_parse_from(["tandem", "status", "run-1", "-d"]).unwrap();
        match cli.command {
            Commands::Status { run_id, detailed } => {
                assert_eq!(run_id, "run-1");
                assert!(detailed);
            }
            _ => panic!("Expected status command"),
        }
    }

    #[test]
    fn test_log_with_actor() {
        let cli = Cli::try_parse_from(["tandem", "log", "run-1", "--actor", "planner"]).unwrap();
        match cli.command {
            Commands::Log { run_id, actor } => {
                assert_eq!(run_id, "run-1");
                assert_eq!(actor.as_deref(), Some("planner"));
            }
            _ => panic!("Expected log command"),
        }
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }
}
