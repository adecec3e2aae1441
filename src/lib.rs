//! Test run reporting and incremental-run tracking
//!
//! A test harness drives a [`reporter::Reporter`] through its lifecycle
//! hooks. The reporter keeps one run document and one result document per
//! test in a [`store::DocumentStore`], counts outcomes on the run, and skips
//! the remainder of an incremental test group after its first failure.
//!
//! ```no_run
//! use std::sync::Arc;
//! use run_tracker::models::{Outcome, RunPlan, TestIdentity};
//! use run_tracker::reporter::{Reporter, ReporterOptions};
//! use run_tracker::store::JsonFileStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Arc::new(JsonFileStore::open("./store")?);
//! let mut reporter = Reporter::new(store, ReporterOptions::default());
//!
//! reporter.on_run_start(RunPlan::new("api").with_total_tests(1))?;
//! reporter.on_test_start(TestIdentity::new("api.UsersTest", "test_create"))?;
//! reporter.on_test_end(Outcome::Success, None, None)?;
//! let run = reporter.on_run_end()?;
//! assert_eq!(run.tests_executed_count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! Several worker processes reporting into one run share a
//! [`tracker::RunAggregator`]; see [`events::replay_workers`].

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod output;
pub mod reporter;
pub mod results;
pub mod store;
pub mod tracker;
pub mod utils;

pub use error::{ContractViolation, ReportError, ReportResult};
