//! Incremental group sequencing
//!
//! Tests marked incremental form an ordered group per class. Once a member
//! fails or errors, every later member of that group is skipped.

use std::collections::HashMap;
use tracing::info;

use crate::models::Outcome;

/// State of one incremental group
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GroupState {
    #[default]
    Clean,
    Blocked { first_failure: String },
}

/// Whether a test may run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Skip(String),
}

impl Verdict {
    pub fn is_skip(&self) -> bool {
        matches!(self, Verdict::Skip(_))
    }
}

/// Skip reason for a test blocked by `first_failure`
pub fn skip_reason(first_failure: &str) -> String {
    format!("previous test failed ({first_failure})")
}

/// Per-group skip-after-failure policy
#[derive(Debug, Default)]
pub struct IncrementalSequencer {
    groups: HashMap<String, GroupState>,
}

impl IncrementalSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether the next test of `group_id` may run
    pub fn check(&self, group_id: &str) -> Verdict {
        match self.groups.get(group_id) {
            Some(GroupState::Blocked { first_failure }) => Verdict::Skip(skip_reason(first_failure)),
            _ => Verdict::Proceed,
        }
    }

    /// Feed a member's terminal outcome.
    ///
    /// Returns true when this call blocked the group. Once blocked, the first
    /// failing test stays recorded.
    pub fn record_outcome(&mut self, group_id: &str, outcome: Outcome, test_name: &str) -> bool {
        let state = self.groups.entry(group_id.to_string()).or_default();
        if *state == GroupState::Clean && outcome.fails_run() {
            info!("Incremental group {group_id} blocked by {test_name}");
            *state = GroupState::Blocked {
                first_failure: test_name.to_string(),
            };
            return true;
        }
        false
    }

    pub fn state(&self, group_id: &str) -> GroupState {
        self.groups.get(group_id).cloned().unwrap_or_default()
    }

    /// Drop a finished group's state
    pub fn finish_group(&mut self, group_id: &str) {
        self.groups.remove(group_id);
    }
}
