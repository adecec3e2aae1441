//! Result aggregation for a single test
//!
//! Owns the one-test-to-one-document mapping. Every call persists the full
//! record: the first write inserts, later writes replace by id.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::models::{
    resolve_components, Outcome, ResultRecord, SubTestRecord, TestIdentity, VersionedComponent,
};
use crate::store::{to_document, DocumentId, DocumentStore, Persisted, StoreError, RESULT_COLLECTION};

/// One test's result document
pub struct TestResultDocument<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    persisted: Persisted,
    record: ResultRecord,
}

impl<S: DocumentStore + ?Sized> TestResultDocument<S> {
    /// Open a record for `identity`. Nothing is written until the first
    /// sub-test or terminal outcome.
    pub fn start(
        store: Arc<S>,
        run_id: Option<DocumentId>,
        suite: Option<String>,
        identity: &TestIdentity,
        execution_order: u64,
        platform_components: &[VersionedComponent],
    ) -> Self {
        let (components, main_component) =
            resolve_components(&identity.components, platform_components);

        let record = ResultRecord {
            run_id,
            suite,
            full_name: identity.full_name.clone(),
            description: identity.description.clone(),
            execution_order,
            priority: identity.priority,
            components,
            main_component,
            tags: identity.tags.clone(),
            defects: identity.defects.clone(),
            start_time: Utc::now(),
            duration_seconds: None,
            status: Outcome::Success,
            reason_skipped: None,
            stacktrace: None,
            log: None,
            sub_tests: Vec::new(),
        };

        Self {
            store,
            persisted: Persisted::Unsaved,
            record,
        }
    }

    /// Append a sub-test outcome and persist.
    ///
    /// The first non-success sub-test sets the record status; later
    /// sub-tests never change it.
    pub fn end_sub_test(
        &mut self,
        params: serde_json::Value,
        outcome: Outcome,
        stacktrace: Option<String>,
    ) -> Result<DocumentId, StoreError> {
        self.record.sub_tests.push(SubTestRecord {
            params,
            result: outcome,
            stacktrace,
        });
        if self.record.status.is_success() {
            self.record.status = outcome;
        }
        self.save()
    }

    /// Record the terminal outcome and persist. The terminal outcome always
    /// overrides any sub-test status.
    pub fn end(
        &mut self,
        outcome: Outcome,
        stacktrace: Option<String>,
        reason_skipped: Option<String>,
    ) -> Result<DocumentId, StoreError> {
        let elapsed = Utc::now() - self.record.start_time;
        self.record.duration_seconds = Some(rounded_seconds(elapsed));
        self.record.status = outcome;
        self.record.stacktrace = stacktrace;
        self.record.reason_skipped = reason_skipped;
        self.save()
    }

    /// Attach captured output; written with the next persist
    pub fn set_log(&mut self, log: impl Into<String>) {
        self.record.log = Some(log.into());
    }

    pub fn id(&self) -> Option<&DocumentId> {
        self.persisted.id()
    }

    pub fn record(&self) -> &ResultRecord {
        &self.record
    }

    pub fn has_sub_tests(&self) -> bool {
        !self.record.sub_tests.is_empty()
    }

    pub fn into_record(self) -> ResultRecord {
        self.record
    }

    fn save(&mut self) -> Result<DocumentId, StoreError> {
        let document = to_document(RESULT_COLLECTION, &self.record)?;
        let id = self
            .persisted
            .upsert(&*self.store, RESULT_COLLECTION, document)?;
        debug!("Saved result {} ({})", self.record.full_name, self.record.status);
        Ok(id)
    }
}

/// Seconds rounded to the nearest millisecond, never negative
fn rounded_seconds(elapsed: TimeDelta) -> f64 {
    let micros = elapsed
        .num_microseconds()
        .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1000))
        .max(0);
    (micros as f64 / 1000.0).round() / 1000.0
}
