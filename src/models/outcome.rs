//! Outcome kinds for tests and runs
//!
//! Defines the per-test outcome and the derived run status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final (or sub-test) outcome of a test
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
    Skip,
    ExpectedFailure,
    UnexpectedSuccess,
}

impl Outcome {
    /// Get all outcome kinds
    pub fn all() -> [Outcome; 6] {
        [
            Outcome::Success,
            Outcome::Failure,
            Outcome::Error,
            Outcome::Skip,
            Outcome::ExpectedFailure,
            Outcome::UnexpectedSuccess,
        ]
    }

    /// Stored name of the outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Error => "error",
            Outcome::Skip => "skip",
            Outcome::ExpectedFailure => "expected_failure",
            Outcome::UnexpectedSuccess => "unexpected_success",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "success" | "pass" => Some(Outcome::Success),
            "failure" | "fail" => Some(Outcome::Failure),
            "error" => Some(Outcome::Error),
            "skip" | "skipped" => Some(Outcome::Skip),
            "expected_failure" => Some(Outcome::ExpectedFailure),
            "unexpected_success" => Some(Outcome::UnexpectedSuccess),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Success => "✓",
            Outcome::Failure => "✗",
            Outcome::Error => "!",
            Outcome::Skip => "○",
            Outcome::ExpectedFailure => "x",
            Outcome::UnexpectedSuccess => "u",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Whether this outcome marks the run as failed and blocks an incremental group
    pub fn fails_run(&self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a test run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
