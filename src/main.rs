//! run-tracker - test run reporting and incremental-run tracking
//!
//! Replays harness lifecycle events into a document store and queries the
//! stored runs and results.
//!
//! ## Usage
//!
//! ```bash
//! # Record one harness event stream
//! run-tracker replay events.jsonl --suite api
//!
//! # Several workers reporting into one run
//! run-tracker replay worker-*.jsonl --run-id 65f0c0de0000000000000001
//!
//! # Browse stored runs and results
//! run-tracker runs --suite api
//! run-tracker results <RUN_ID> --status failure --export failed.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

mod cli;

use cli::Args;
use run_tracker::config::{print_env_help, EnvConfig, ReporterConfig};
use run_tracker::events::{read_events, replay, replay_workers, LifecycleEvent};
use run_tracker::models::{Outcome, ResultRecord, RunRecord};
use run_tracker::output::{OutputFormat, ResultFormatter};
use run_tracker::reporter::Reporter;
use run_tracker::results::{ExportFormat, RunHistory};
use run_tracker::store::{self, DocumentId, DocumentStore};
use run_tracker::utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        // works on files directly and must not fail on a broken config
        cli::Command::Config(config_args) => {
            init_logger(verbosity(args.verbose, LogLevel::Info));
            manage_config(config_args, args.config.as_deref())?;
        }
        cli::Command::Schema { kind } => {
            print_schema(kind)?;
        }
        command => {
            let env = EnvConfig::load();
            let config = load_config(args.config.as_deref(), &env)?;
            let level = LogLevel::from_str(&config.log_level).unwrap_or_default();
            init_logger(verbosity(args.verbose, level));
            run_command(command, config).await?;
        }
    }

    Ok(())
}

async fn run_command(command: cli::Command, config: ReporterConfig) -> Result<()> {
    match command {
        cli::Command::Replay(replay_args) => run_replay(replay_args, config).await,
        cli::Command::Runs(runs_args) => list_runs(runs_args, &config),
        cli::Command::Results(results_args) => show_results(results_args, &config),
        cli::Command::Schema { kind } => print_schema(kind),
        cli::Command::Config(config_args) => manage_config(config_args, None),
    }
}

fn verbosity(verbose: bool, level: LogLevel) -> LogLevel {
    if verbose {
        LogLevel::Debug
    } else {
        level
    }
}

/// Config file, then RUN_TRACKER_* variables
fn load_config(path: Option<&Path>, env: &EnvConfig) -> Result<ReporterConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let mut config = match path {
        Some(path) => ReporterConfig::load(&path)?,
        None => ReporterConfig::load_default()?,
    };
    env.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn open_store(config: &ReporterConfig) -> Result<Arc<dyn DocumentStore>> {
    let store = store::open(&config.store).with_context(|| {
        format!("Failed to open {} store", config.store.backend.name())
    })?;
    debug!("Using {} store", config.store.backend.name());
    Ok(store)
}

fn output_format(format: &str) -> OutputFormat {
    OutputFormat::from_str(format).unwrap_or(OutputFormat::Table)
}

async fn run_replay(args: cli::ReplayArgs, mut config: ReporterConfig) -> Result<()> {
    if args.suite.is_some() {
        config.suite = args.suite;
    }
    if args.environment.is_some() {
        config.environment = args.environment;
    }
    if let Some(id) = args.run_id {
        config.test_run_id = Some(DocumentId::new(id));
    }
    if args.failed_tests_file.is_some() {
        config.failed_tests_file_path = args.failed_tests_file;
    }

    let mut streams = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let mut events = read_events(path)?;
        for event in &mut events {
            if let LifecycleEvent::RunStart(plan) = event {
                config.fill_plan(plan);
            }
        }
        info!("Loaded {} events from {}", events.len(), path.display());
        streams.push(events);
    }

    let store = open_store(&config)?;
    let formatter = ResultFormatter::new(output_format(&args.format));

    if streams.len() == 1 {
        let mut reporter = Reporter::new(store, config.reporter_options());
        let events = streams.into_iter().flatten();
        let stats = replay(&mut reporter, events)?;

        if let Some(id) = &stats.run_id {
            info!("Run {id}: {} tests, {} skipped", stats.tests, stats.skipped);
        }
        if stats.dropped > 0 {
            info!("Dropped {} events of vetoed tests", stats.dropped);
        }
        match &stats.run {
            Some(run) => println!("{}", formatter.format_run(run)),
            None => println!("Stream ended without run_end; run left open"),
        }
        print_failed(stats.failed.ids());
    } else {
        let report = replay_workers(store, config.reporter_options(), streams).await?;
        for (index, worker) in report.workers.iter().enumerate() {
            info!(
                "Worker {index}: {} tests, {} skipped",
                worker.tests, worker.skipped
            );
        }
        println!("{}", formatter.format_run(&report.run));
        print_failed(report.failed.ids());
    }

    Ok(())
}

fn print_failed<'a>(ids: impl Iterator<Item = &'a str>) {
    let ids: Vec<_> = ids.collect();
    if !ids.is_empty() {
        println!("\nFailed tests:");
        for id in ids {
            println!("  {id}");
        }
    }
}

fn list_runs(args: cli::RunsArgs, config: &ReporterConfig) -> Result<()> {
    let history = RunHistory::new(open_store(config)?);
    let mut runs = history.runs(args.suite.as_deref())?;
    if let Some(limit) = args.limit {
        runs.truncate(limit);
    }

    if runs.is_empty() {
        println!("\n📭 No stored runs found.");
        println!("   Record one with: run-tracker replay <EVENTS>");
        return Ok(());
    }

    let formatter = ResultFormatter::new(output_format(&args.format));
    println!("{}", formatter.format_runs(&runs));
    Ok(())
}

fn show_results(args: cli::ResultsArgs, config: &ReporterConfig) -> Result<()> {
    let history = RunHistory::new(open_store(config)?);
    let run_id = DocumentId::new(args.run_id);

    let run = history
        .run(&run_id)?
        .ok_or_else(|| anyhow::anyhow!("Run not found: {run_id}"))?;

    let status = match &args.status {
        Some(s) => Some(
            Outcome::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown status: {s}"))?,
        ),
        None => None,
    };
    let results = history.results(&run_id, status)?;

    if let Some(path) = &args.export {
        let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        history.export(&results, path, format)?;
        println!("✓ Exported {} results to {}", results.len(), path.display());
        return Ok(());
    }

    let format = output_format(&args.format);
    let formatter = ResultFormatter::new(format);
    if format == OutputFormat::Table {
        println!("{}", formatter.format_run(&run));
    }
    println!("{}", formatter.format_results(&results));
    Ok(())
}

fn print_schema(kind: cli::SchemaKind) -> Result<()> {
    let schema = match kind {
        cli::SchemaKind::Run => schemars::schema_for!(RunRecord),
        cli::SchemaKind::Result => schemars::schema_for!(ResultRecord),
        cli::SchemaKind::Config => schemars::schema_for!(ReporterConfig),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ReporterConfig::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format } => {
            let env_config = EnvConfig::load();
            if env {
                env_config.print_summary();
            } else {
                let config = load_config(config_path, &env_config)?;
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| config_path.map(Path::to_path_buf))
                .or_else(ReporterConfig::find)
                .unwrap_or_else(|| PathBuf::from("./run-tracker.yaml"));

            match ReporterConfig::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {}", path.display());
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}
