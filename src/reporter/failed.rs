//! Failed-test list
//!
//! Names of everything that has to be re-run after a run, written one per
//! line for the next invocation to pick up.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{ReportError, ReportResult};
use crate::models::TestIdentity;

/// Sorted, de-duplicated re-run targets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailedTests {
    ids: BTreeSet<String>,
}

impl FailedTests {
    pub fn new() -> Self {
        Self::default()
    }

    /// A test (or fixture) whose final outcome failed
    pub fn record(&mut self, identity: &TestIdentity) {
        self.ids.insert(identity.rerun_target().to_string());
    }

    /// A test with a failing sub-test
    pub fn record_sub_test(&mut self, identity: &TestIdentity) {
        self.ids.insert(identity.full_name.clone());
    }

    /// Add every id of `other`
    pub fn merge(&mut self, other: &FailedTests) {
        self.ids.extend(other.ids.iter().cloned());
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the ids newline-separated to `path`
    pub fn write(&self, path: &Path) -> ReportResult<()> {
        let contents = self.ids().collect::<Vec<_>>().join("\n");
        fs::write(path, contents).map_err(|source| ReportError::FailedTestsFile {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote {} failed test(s) to {}", self.len(), path.display());
        Ok(())
    }
}
