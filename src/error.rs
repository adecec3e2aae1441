//! Reporting errors

use std::path::PathBuf;
use thiserror::Error;

use crate::store::{DocumentId, StoreError};

/// Hook called out of the `run_start -> {test_start -> sub_test_end* -> test_end}* -> run_end` order
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("run has not been started")]
    RunNotStarted,

    #[error("run has already been started")]
    RunAlreadyStarted,

    #[error("run has already ended")]
    RunEnded,

    #[error("cannot start {requested}: {open} is still open")]
    TestAlreadyOpen { open: String, requested: String },

    #[error("no test is open")]
    NoOpenTest,

    #[error("run ended while {0} is still open")]
    TestStillOpen(String),
}

/// Errors surfaced by the reporting hooks
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Reporting contract violated: {0}")]
    Contract(#[from] ContractViolation),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Run {0} does not exist in the store")]
    UnknownRun(DocumentId),

    #[error("Run aggregator has shut down")]
    AggregatorClosed,

    #[error("Reporting worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Failed to write failed-test list to {path}: {source}")]
    FailedTestsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;
