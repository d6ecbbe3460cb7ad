//! Scheduled entry point for cadence runs.
//!
//! # Usage
//!
//! ```bash
//! # Run every active cadence against a stored snapshot, then save it back
//! tom-cadence --snapshot store.json --write-back run --all
//!
//! # Only the cadences watching target 42, JSON summary on stdout
//! tom-cadence --json run --target-id 42
//!
//! # List registered strategies
//! tom-cadence strategies
//! ```
//!
//! # Environment Variables
//!
//! - `TOM_CADENCE_CONFIG`: Configuration file (overridden by `--config`)
//! - `RUST_LOG`: Log filter (default: info)
//!
//! Exit codes: 0 after a run (individual cadence failures are part of the
//! report), 1 if the store cannot be read at all, 2 on configuration errors
//! detected at startup.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tom_cadence::cadence::{CadenceRunner, RunReport, StrategyRegistry};
use tom_cadence::config::AppConfig;
use tom_cadence::db::{LocalRepository, RepositoryFactory};
use tom_cadence::facility::FacilityRegistry;
use tom_cadence::models::{DynamicCadenceId, TargetId};
use tom_cadence::{Clock, SystemClock};

/// Run dynamic observation cadences.
#[derive(Parser, Debug)]
#[command(name = "tom-cadence", version, about = "Run dynamic observation cadences")]
struct Cli {
    /// Configuration file (default: TOM_CADENCE_CONFIG or tom-cadence.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot to load, overriding repository.snapshot_path
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Save the store back to the snapshot after the run
    #[arg(long, global = true)]
    write_back: bool,

    /// Print the summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cadences and print a summary
    Run(RunSelection),
    /// List registered cadence strategies
    Strategies,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RunSelection {
    /// Every active cadence
    #[arg(long)]
    all: bool,

    /// Active cadences of groups observing this target
    #[arg(long)]
    target_id: Option<i64>,

    /// A single cadence
    #[arg(long)]
    cadence_id: Option<i64>,
}

/// Everything built from configuration before any cadence runs.
struct App {
    repo: Arc<LocalRepository>,
    facilities: FacilityRegistry,
    strategies: StrategyRegistry,
    config: AppConfig,
    snapshot: Option<PathBuf>,
}

fn startup(cli: &Cli) -> anyhow::Result<App> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(snapshot) = &cli.snapshot {
        config.repository.snapshot_path = Some(snapshot.clone());
    }
    config.validate()?;
    let strategies = config
        .strategy_registry()
        .context("runner.enabled_strategies")?;
    let snapshot = config.repository.snapshot_path.clone();
    if cli.write_back && snapshot.is_none() {
        bail!("--write-back needs --snapshot or repository.snapshot_path");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repo = RepositoryFactory::from_settings(&config.repository, clock)?;
    let facilities = config.facility_registry();
    info!(
        facilities = ?facilities.names(),
        strategies = ?strategies.names(),
        "Configuration loaded"
    );
    Ok(App {
        repo,
        facilities,
        strategies,
        config,
        snapshot,
    })
}

async fn run(
    app: App,
    selection: &RunSelection,
    json: bool,
    write_back: bool,
) -> anyhow::Result<()> {
    let runner = CadenceRunner::new(
        app.repo.clone(),
        app.facilities,
        app.strategies,
        Arc::new(SystemClock),
        app.config.runner.settings.clone(),
    );

    let report = if let Some(id) = selection.cadence_id {
        runner.run_cadence(DynamicCadenceId(id)).await?
    } else if let Some(id) = selection.target_id {
        runner.run_for_target(TargetId(id)).await?
    } else {
        runner.run_all().await?
    };

    if write_back {
        if let Some(path) = &app.snapshot {
            app.repo
                .save_snapshot(path)
                .with_context(|| format!("writing snapshot {}", path.display()))?;
            info!(path = %path.display(), "Snapshot written");
        }
    }

    print_report(&report, json)
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "cadences: {} succeeded, {} failed, {} skipped",
        report.succeeded,
        report.failed.len(),
        report.skipped.len()
    );
    println!("observations submitted: {}", report.observations_created);
    if !report.deactivated.is_empty() {
        let ids: Vec<String> = report.deactivated.iter().map(ToString::to_string).collect();
        println!("deactivated: {}", ids.join(", "));
    }
    for (id, failure) in &report.failed {
        println!("  cadence {} [{}]: {}", id, failure.category, failure.message);
    }
    for failure in &report.submission_failures {
        println!(
            "  submission for cadence {} to {} [{}]: {}",
            failure.cadence_id, failure.facility, failure.category, failure.message
        );
    }
    Ok(())
}

fn print_strategies(strategies: &StrategyRegistry, json: bool) -> anyhow::Result<()> {
    if json {
        let listed: Vec<serde_json::Value> = strategies
            .strategies()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name(),
                    "aliases": s.aliases(),
                    "description": s.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
    } else {
        for strategy in strategies.strategies() {
            println!("{:<36} {}", strategy.name(), strategy.description());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let app = match startup(&cli) {
        Ok(app) => app,
        Err(err) => {
            let message = format!("{:#}", err);
            error!(error = %message, "Configuration error");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Command::Strategies => print_strategies(&app.strategies, cli.json),
        Command::Run(selection) => run(app, selection, cli.json, cli.write_back).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("{:#}", err);
            error!(error = %message, "Cadence run aborted");
            ExitCode::FAILURE
        }
    }
}
