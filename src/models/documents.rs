//! Persisted document shapes
//!
//! `RunRecord` and `ResultRecord` are what dashboards and CI gates read;
//! their field names are part of the stored format.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Outcome, Priority, RunStatus, VersionedComponent};
use crate::store::DocumentId;

/// Parameters describing a run at suite start
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub environment_version: Option<String>,

    #[serde(default)]
    pub suite_name: Option<String>,

    #[serde(default)]
    pub release: Option<String>,

    #[serde(default)]
    pub platform_components: Vec<VersionedComponent>,

    /// Number of tests collected for this run
    #[serde(default)]
    pub total_tests_planned: Option<u64>,

    /// Existing run document to resume instead of inserting a new one
    #[serde(default)]
    pub external_run_id: Option<DocumentId>,
}

impl RunPlan {
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: Some(suite_name.into()),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_components(mut self, components: Vec<VersionedComponent>) -> Self {
        self.platform_components = components;
        self
    }

    pub fn with_total_tests(mut self, total: u64) -> Self {
        self.total_tests_planned = Some(total);
        self
    }

    pub fn resume(mut self, run_id: DocumentId) -> Self {
        self.external_run_id = Some(run_id);
        self
    }
}

/// One document per test-run invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunRecord {
    pub environment: Option<String>,
    pub environment_version: Option<String>,
    pub suite_name: Option<String>,
    pub release: Option<String>,
    pub platform_components: Vec<VersionedComponent>,

    /// Host that launched the run
    pub started_by: String,

    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_tests_planned: Option<u64>,
    pub tests_executed_count: u64,

    /// Count per outcome kind, every kind present
    pub result_counts: BTreeMap<Outcome, u64>,

    pub status: RunStatus,
    pub log: Option<String>,
}

impl RunRecord {
    /// Fresh record for `plan`, stamped now
    pub fn new(plan: &RunPlan, started_by: impl Into<String>) -> Self {
        Self {
            environment: plan.environment.clone(),
            environment_version: plan.environment_version.clone(),
            suite_name: plan.suite_name.clone(),
            release: plan.release.clone(),
            platform_components: plan.platform_components.clone(),
            started_by: started_by.into(),
            start_time: Utc::now(),
            end_time: None,
            total_tests_planned: plan.total_tests_planned,
            tests_executed_count: 0,
            result_counts: Outcome::all().into_iter().map(|o| (o, 0)).collect(),
            status: RunStatus::Success,
            log: None,
        }
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.result_counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Outcome of one sub-test block
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubTestRecord {
    /// Sub-test parameters as given by the harness
    pub params: serde_json::Value,
    pub result: Outcome,
    pub stacktrace: Option<String>,
}

/// One document per test case (fixture failures included)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultRecord {
    pub run_id: Option<DocumentId>,
    pub suite: Option<String>,
    pub full_name: String,
    pub description: Option<String>,
    pub execution_order: u64,
    pub priority: Priority,
    pub components: Vec<VersionedComponent>,
    pub main_component: Option<String>,
    pub tags: Vec<String>,
    pub defects: Vec<String>,
    pub start_time: DateTime<Utc>,

    /// Set by the terminal call, millisecond precision
    pub duration_seconds: Option<f64>,

    pub status: Outcome,
    pub reason_skipped: Option<String>,
    pub stacktrace: Option<String>,
    pub log: Option<String>,
    pub sub_tests: Vec<SubTestRecord>,
}

impl ResultRecord {
    /// Whether the test or any of its sub-tests failed or errored
    pub fn has_failures(&self) -> bool {
        self.status.fails_run() || self.sub_tests.iter().any(|s| s.result.fails_run())
    }
}
