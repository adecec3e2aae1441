//! Run tracking
//!
//! Owns the single run document of a suite invocation and its counters.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};
use crate::models::{Outcome, RunPlan, RunRecord, RunStatus};
use crate::store::{to_document, DocumentId, DocumentStore, Persisted, RUN_COLLECTION};

/// How `tests_executed_count` treats tests with sub-tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// Every completed test counts once
    #[default]
    PerTest,
    /// A test with sub-tests counts once more the first time its group is seen
    SubTestGroups,
}

impl CountingMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "per_test" => Some(CountingMode::PerTest),
            "sub_test_groups" | "legacy" => Some(CountingMode::SubTestGroups),
            _ => None,
        }
    }
}

/// Name of the launching host
pub fn started_by() -> String {
    whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string())
}

/// The run document and its aggregate counters
pub struct RunTracker<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    persisted: Persisted,
    record: RunRecord,
    counting: CountingMode,
    seen_sub_test_groups: HashSet<String>,
}

impl<S: DocumentStore + ?Sized> RunTracker<S> {
    /// Start a run.
    ///
    /// A fresh run is inserted. With `plan.external_run_id` the existing
    /// document is looked up and replaced instead; a store that keeps
    /// nothing skips the lookup.
    pub fn start(store: Arc<S>, plan: &RunPlan, counting: CountingMode) -> ReportResult<Self> {
        let record = RunRecord::new(plan, started_by());
        let document = to_document(RUN_COLLECTION, &record)?;

        let persisted = match &plan.external_run_id {
            Some(id) => {
                if store.keeps_documents() && store.find_one(RUN_COLLECTION, id)?.is_none() {
                    return Err(ReportError::UnknownRun(id.clone()));
                }
                store.replace(RUN_COLLECTION, id, document)?;
                Persisted::Saved(id.clone())
            }
            None => Persisted::Saved(store.insert(RUN_COLLECTION, document)?),
        };

        if let Some(id) = persisted.id() {
            info!(
                "Started run {} (suite: {})",
                id,
                record.suite_name.as_deref().unwrap_or("-")
            );
        }

        Ok(Self {
            store,
            persisted,
            record,
            counting,
            seen_sub_test_groups: HashSet::new(),
        })
    }

    /// Count one completed test and persist.
    ///
    /// `sub_test_group` names the test when it reported sub-tests.
    pub fn update_result(
        &mut self,
        outcome: Outcome,
        sub_test_group: Option<&str>,
    ) -> ReportResult<()> {
        *self.record.result_counts.entry(outcome).or_insert(0) += 1;
        self.record.tests_executed_count += 1;

        if let (CountingMode::SubTestGroups, Some(group)) = (self.counting, sub_test_group) {
            if self.seen_sub_test_groups.insert(group.to_string()) {
                self.record.tests_executed_count += 1;
            }
        }

        if outcome.fails_run() {
            self.record.status = RunStatus::Failure;
        }

        debug!(
            "Run counts: {} executed, status {}",
            self.record.tests_executed_count, self.record.status
        );
        self.save()
    }

    /// Stamp the end time and persist
    pub fn end(&mut self) -> ReportResult<()> {
        self.record.end_time = Some(Utc::now());
        self.save()?;
        info!(
            "Finished run {} with status {}",
            self.run_id_or_default(),
            self.record.status
        );
        Ok(())
    }

    /// Attach a run-level log; written with the next persist
    pub fn set_log(&mut self, log: impl Into<String>) {
        self.record.log = Some(log.into());
    }

    pub fn run_id(&self) -> Option<&DocumentId> {
        self.persisted.id()
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn counting(&self) -> CountingMode {
        self.counting
    }

    fn run_id_or_default(&self) -> &str {
        self.persisted.id().map_or("-", DocumentId::as_str)
    }

    fn save(&mut self) -> ReportResult<()> {
        let document = to_document(RUN_COLLECTION, &self.record)?;
        self.persisted
            .upsert(&*self.store, RUN_COLLECTION, document)?;
        Ok(())
    }
}
