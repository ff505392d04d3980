use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use cli::report;
use tandem::config::{TandemConfig, load_config};
use tandem::domain::{RunStatus, RunSummary};
use tandem::orchestrator::{Orchestrator, recovery};
use tandem::storage::RunStore;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tandem.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, mut config: TandemConfig) -> Result<()> {
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  runs dir: {}", config.run.runs_dir.display());
    }

    match &cli.command {
        Commands::Run { requirement, max_tasks } => {
            if let Some(max) = max_tasks {
                config.run.max_tasks = *max;
                config.validate()?;
            }
            handle_run_command(requirement, &config).await
        }
        Commands::Resume { run_id } => handle_resume_command(run_id, &config).await,
        Commands::Status { run_id, detailed } => handle_status_command(run_id, *detailed, &config),
        Commands::Log { run_id, actor } => handle_log_command(run_id, actor.as_deref(), &config),
        Commands::List { interrupted } => handle_list_command(*interrupted, &config),
    }
}

async fn handle_run_command(requirement: &str, config: &TandemConfig) -> Result<()> {
    info!("Starting run for requirement ({} chars)", requirement.len());
    println!("{} {}", "Running:".green(), requirement.lines().next().unwrap_or(""));
    let orchestrator = Orchestrator::from_config(config);
    let summary = orchestrator.run(requirement).await.context("Run halted")?;
    finish(&summary)
}

async fn handle_resume_command(run_id: &str, config: &TandemConfig) -> Result<()> {
    info!("Resuming run: {}", run_id);
    println!("{} {}", "Resuming:".green(), run_id);
    let orchestrator = Orchestrator::from_config(config);
    let summary = orchestrator
        .resume(run_id)
        .await
        .context(format!("Failed to resume {}", run_id))?;
    finish(&summary)
}

/// Print the summary; a failed run is a non-zero exit
fn finish(summary: &RunSummary) -> Result<()> {
    println!("{}", report::summary(summary));
    if summary.status == RunStatus::Failed {
        eyre::bail!(
            "run {} failed: {}",
            summary.run_id,
            summary.failure_reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}

fn handle_status_command(run_id: &str, detailed: bool, config: &TandemConfig) -> Result<()> {
    info!("Getting status for run: {} (detailed: {})", run_id, detailed);
    let store = RunStore::new(&config.run.runs_dir);
    let state = store.load(run_id).context(format!("Unknown run {}", run_id))?;
    println!("{}", report::state(&state, detailed));
    Ok(())
}

fn handle_log_command(run_id: &str, actor: Option<&str>, config: &TandemConfig) -> Result<()> {
    info!("Printing work log for run: {} (actor: {:?})", run_id, actor);
    let store = RunStore::new(&config.run.runs_dir);
    if !store.exists(run_id) {
        eyre::bail!("Unknown run {}", run_id);
    }
    let log = store.work_log(run_id);
    let entries = match actor {
        Some(actor) => log.by_actor(actor)?,
        None => log.entries()?,
    };
    for entry in &entries {
        println!("{}", report::log_line(entry));
    }
    Ok(())
}

fn handle_list_command(interrupted: bool, config: &TandemConfig) -> Result<()> {
    info!("Listing runs (interrupted only: {})", interrupted);
    let store = RunStore::new(&config.run.runs_dir);
    let runs = if interrupted {
        recovery::interrupted(&store)?
    } else {
        store.list()?
    };
    if runs.is_empty() {
        println!("{}", "No runs found".yellow());
    }
    for state in &runs {
        println!("{}", report::list_line(state));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
