//! Lifecycle event streams
//!
//! A harness that cannot link the reporter directly writes its hook calls as
//! JSON lines, one event per line:
//!
//! ```text
//! {"event": "run_start", "suite_name": "api"}
//! {"event": "test_start", "test": {"full_name": "api.T.test_a", "class_name": "api.T"}}
//! {"event": "test_end", "outcome": "success"}
//! {"event": "run_end"}
//! ```

mod replay;

pub use replay::{replay, replay_workers, ReplayStats, WorkersReport};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::models::{Outcome, RunPlan, TestIdentity};

/// One reporting hook call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    RunStart(RunPlan),

    TestStart {
        test: TestIdentity,
    },

    /// Captured output of the open test
    TestLog {
        text: String,
    },

    SubTestEnd {
        #[serde(default)]
        params: serde_json::Value,
        outcome: Outcome,
        #[serde(default)]
        stacktrace: Option<String>,
    },

    TestEnd {
        outcome: Outcome,
        #[serde(default)]
        stacktrace: Option<String>,
        #[serde(default)]
        reason_skipped: Option<String>,
    },

    RunEnd,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RunStart(_) => "run_start",
            LifecycleEvent::TestStart { .. } => "test_start",
            LifecycleEvent::TestLog { .. } => "test_log",
            LifecycleEvent::SubTestEnd { .. } => "sub_test_end",
            LifecycleEvent::TestEnd { .. } => "test_end",
            LifecycleEvent::RunEnd => "run_end",
        }
    }
}

/// Parse a JSON-lines event stream. Blank lines and `#` comments are skipped.
pub fn parse_events(reader: impl BufRead) -> Result<Vec<LifecycleEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Read an event stream from a file
pub fn read_events(path: &Path) -> Result<Vec<LifecycleEvent>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open event stream: {}", path.display()))?;
    parse_events(BufReader::new(file))
        .with_context(|| format!("Failed to parse event stream: {}", path.display()))
}
