//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Test run reporting and incremental-run tracking
#[derive(Parser, Debug)]
#[command(name = "run-tracker")]
#[command(version)]
#[command(about = "Record test runs and results in a document store")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay harness lifecycle events into the store
    Replay(ReplayArgs),

    /// List stored runs
    Runs(RunsArgs),

    /// Show the results of one run
    Results(ResultsArgs),

    /// Print the JSON schema of a stored document or the config file
    Schema {
        #[arg(value_enum)]
        kind: SchemaKind,
    },

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for replay command
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Event files (JSON lines); several files report into one shared run
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Suite name when the events do not carry one
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Environment under test
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Existing run id to report into
    #[arg(long)]
    pub run_id: Option<String>,

    /// Where to write the failed-test list
    #[arg(long)]
    pub failed_tests_file: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "summary")]
    pub format: String,
}

/// Arguments for runs command
#[derive(Parser, Debug)]
pub struct RunsArgs {
    /// Filter by suite
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Show at most this many runs
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Run id
    pub run_id: String,

    /// Only results with this status
    #[arg(long)]
    pub status: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export to file (.json or .csv)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Run,
    Result,
    Config,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(default_value = "./run-tracker.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variables instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard locations)
        file: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_args() {
        let args = Args::parse_from([
            "run-tracker",
            "replay",
            "worker-1.jsonl",
            "worker-2.jsonl",
            "--suite",
            "api",
            "--run-id",
            "65f0c0de0000000000000001",
        ]);
        match args.command {
            Command::Replay(replay) => {
                assert_eq!(replay.files.len(), 2);
                assert_eq!(replay.suite.as_deref(), Some("api"));
                assert_eq!(replay.run_id.as_deref(), Some("65f0c0de0000000000000001"));
                assert_eq!(replay.format, "summary");
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_replay_requires_files() {
        assert!(Args::try_parse_from(["run-tracker", "replay"]).is_err());
    }

    #[test]
    fn test_results_args_with_global_config() {
        let args = Args::parse_from([
            "run-tracker",
            "results",
            "abc",
            "--status",
            "failure",
            "--config",
            "ci.yaml",
            "-v",
        ]);
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("ci.yaml")));
        match args.command {
            Command::Results(results) => {
                assert_eq!(results.run_id, "abc");
                assert_eq!(results.status.as_deref(), Some("failure"));
            }
            _ => panic!("Expected Results command"),
        }
    }

    #[test]
    fn test_schema_kind() {
        let args = Args::parse_from(["run-tracker", "schema", "result"]);
        match args.command {
            Command::Schema { kind } => assert_eq!(kind, SchemaKind::Result),
            _ => panic!("Expected Schema command"),
        }
    }
}
