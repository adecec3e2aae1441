//! Reporting hooks
//!
//! [`Reporter`] is what a test harness drives. Calls must follow
//! `on_run_start -> {on_test_start -> on_sub_test_end* -> on_test_end}* -> on_run_end`;
//! anything else is returned as a [`ContractViolation`].

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::FailedTests;
use crate::error::{ContractViolation, ReportResult};
use crate::models::{Outcome, ResultRecord, RunPlan, RunRecord, TestIdentity, VersionedComponent};
use crate::store::{DocumentId, DocumentStore};
use crate::tracker::{
    AggregatorHandle, CountingMode, IncrementalSequencer, RunTracker, TestResultDocument, Verdict,
};

/// Reporter settings
#[derive(Clone, Debug, Default)]
pub struct ReporterOptions {
    pub counting: CountingMode,

    /// Where `on_run_end` writes the re-run list
    pub failed_tests_file: Option<PathBuf>,
}

impl ReporterOptions {
    pub fn with_counting(mut self, counting: CountingMode) -> Self {
        self.counting = counting;
        self
    }

    pub fn with_failed_tests_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.failed_tests_file = Some(path.into());
        self
    }
}

/// What the harness should do with a started test
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestStart {
    /// Run the test body
    Proceed,
    /// Already recorded as skipped; do not run the body or call `on_test_end`
    Skipped { reason: String },
}

impl TestStart {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TestStart::Skipped { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Ended,
}

enum RunBackend<S: DocumentStore + ?Sized> {
    Local(Option<RunTracker<S>>),
    Shared(AggregatorHandle),
}

struct OpenTest<S: DocumentStore + ?Sized> {
    identity: TestIdentity,
    document: TestResultDocument<S>,
}

/// Reporting entry point for one worker
pub struct Reporter<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    options: ReporterOptions,
    backend: RunBackend<S>,
    phase: Phase,
    run_id: Option<DocumentId>,
    suite: Option<String>,
    platform_components: Vec<VersionedComponent>,
    sequencer: IncrementalSequencer,
    current_class: Option<String>,
    open: Option<OpenTest<S>>,
    execution_order: u64,
    failed: FailedTests,
}

impl<S: DocumentStore + ?Sized> Reporter<S> {
    /// Reporter owning its run document
    pub fn new(store: Arc<S>, options: ReporterOptions) -> Self {
        Self::with_backend(store, options, RunBackend::Local(None))
    }

    /// Reporter counting into a run shared through an aggregator
    pub fn shared(store: Arc<S>, options: ReporterOptions, handle: AggregatorHandle) -> Self {
        Self::with_backend(store, options, RunBackend::Shared(handle))
    }

    fn with_backend(store: Arc<S>, options: ReporterOptions, backend: RunBackend<S>) -> Self {
        Self {
            store,
            options,
            backend,
            phase: Phase::NotStarted,
            run_id: None,
            suite: None,
            platform_components: Vec::new(),
            sequencer: IncrementalSequencer::new(),
            current_class: None,
            open: None,
            execution_order: 0,
            failed: FailedTests::new(),
        }
    }

    /// Start (or resume) the run document
    pub fn on_run_start(&mut self, plan: RunPlan) -> ReportResult<DocumentId> {
        match self.phase {
            Phase::NotStarted => {}
            Phase::Running => return Err(ContractViolation::RunAlreadyStarted.into()),
            Phase::Ended => return Err(ContractViolation::RunEnded.into()),
        }

        let run_id = match &mut self.backend {
            RunBackend::Local(slot) => {
                let tracker = RunTracker::start(self.store.clone(), &plan, self.options.counting)?;
                let id = tracker.run_id().cloned();
                *slot = Some(tracker);
                id.ok_or(ContractViolation::RunNotStarted)?
            }
            RunBackend::Shared(handle) => handle.begin(plan.clone())?,
        };

        self.suite = plan.suite_name;
        self.platform_components = plan.platform_components;
        self.run_id = Some(run_id.clone());
        self.phase = Phase::Running;
        Ok(run_id)
    }

    /// Open a result record for `identity`.
    ///
    /// A member of a blocked incremental group is recorded as skipped right
    /// away and [`TestStart::Skipped`] is returned.
    pub fn on_test_start(&mut self, identity: TestIdentity) -> ReportResult<TestStart> {
        self.ensure_running()?;
        if let Some(open) = &self.open {
            return Err(ContractViolation::TestAlreadyOpen {
                open: open.identity.full_name.clone(),
                requested: identity.full_name,
            }
            .into());
        }

        // a new class closes the previous class's incremental group
        if self.current_class.as_deref() != Some(identity.class_name.as_str()) {
            if let Some(previous) = self.current_class.take() {
                self.sequencer.finish_group(&previous);
            }
            self.current_class = Some(identity.class_name.clone());
        }

        self.execution_order += 1;
        debug!("Starting {} (#{})", identity.full_name, self.execution_order);
        let document = TestResultDocument::start(
            self.store.clone(),
            self.run_id.clone(),
            self.suite.clone(),
            &identity,
            self.execution_order,
            &self.platform_components,
        );
        let verdict = match identity.group_id() {
            Some(group) => self.sequencer.check(group),
            None => Verdict::Proceed,
        };
        self.open = Some(OpenTest { identity, document });

        match verdict {
            Verdict::Proceed => Ok(TestStart::Proceed),
            Verdict::Skip(reason) => {
                if let Some(open) = &self.open {
                    info!("Skipping {}: {}", open.identity.full_name, reason);
                }
                self.on_test_end(Outcome::Skip, None, Some(reason.clone()))?;
                Ok(TestStart::Skipped { reason })
            }
        }
    }

    /// Record one sub-test outcome of the open test
    pub fn on_sub_test_end(
        &mut self,
        params: serde_json::Value,
        outcome: Outcome,
        stacktrace: Option<String>,
    ) -> ReportResult<()> {
        self.ensure_running()?;
        let open = self.open.as_mut().ok_or(ContractViolation::NoOpenTest)?;
        open.document.end_sub_test(params, outcome, stacktrace)?;
        if outcome.fails_run() {
            self.failed.record_sub_test(&open.identity);
        }
        Ok(())
    }

    /// Close the open test with its terminal outcome
    pub fn on_test_end(
        &mut self,
        outcome: Outcome,
        stacktrace: Option<String>,
        reason_skipped: Option<String>,
    ) -> ReportResult<ResultRecord> {
        self.ensure_running()?;
        let OpenTest {
            identity,
            mut document,
        } = self.open.take().ok_or(ContractViolation::NoOpenTest)?;

        document.end(outcome, stacktrace, reason_skipped)?;

        if let Some(group) = identity.group_id() {
            self.sequencer
                .record_outcome(group, outcome, &identity.full_name);
        }
        if outcome.fails_run() {
            self.failed.record(&identity);
        }

        let sub_test_group = document
            .has_sub_tests()
            .then_some(identity.full_name.as_str());
        match &mut self.backend {
            RunBackend::Local(Some(tracker)) => tracker.update_result(outcome, sub_test_group)?,
            RunBackend::Local(None) => return Err(ContractViolation::RunNotStarted.into()),
            RunBackend::Shared(handle) => handle.record(outcome, sub_test_group)?,
        }

        debug!("Finished {} with {}", identity.full_name, outcome);
        Ok(document.into_record())
    }

    /// Close the run and write the failed-test list if configured
    pub fn on_run_end(&mut self) -> ReportResult<RunRecord> {
        self.ensure_running()?;
        if let Some(open) = &self.open {
            return Err(ContractViolation::TestStillOpen(open.identity.full_name.clone()).into());
        }

        let record = match &mut self.backend {
            RunBackend::Local(Some(tracker)) => {
                tracker.end()?;
                tracker.record().clone()
            }
            RunBackend::Local(None) => return Err(ContractViolation::RunNotStarted.into()),
            RunBackend::Shared(handle) => handle.finish()?,
        };
        self.phase = Phase::Ended;
        self.sequencer = IncrementalSequencer::new();
        self.current_class = None;

        if let Some(path) = &self.options.failed_tests_file {
            self.failed.write(path)?;
        }
        Ok(record)
    }

    /// Attach captured output to the open test
    pub fn set_test_log(&mut self, log: impl Into<String>) -> ReportResult<()> {
        let open = self.open.as_mut().ok_or(ContractViolation::NoOpenTest)?;
        open.document.set_log(log);
        Ok(())
    }

    /// Attach a run-level log, written with the next run update
    pub fn set_run_log(&mut self, log: impl Into<String>) {
        match &mut self.backend {
            RunBackend::Local(Some(tracker)) => tracker.set_log(log),
            RunBackend::Local(None) => warn!("Run log set before the run started, ignored"),
            RunBackend::Shared(_) => warn!("Run log is not forwarded to a shared run, ignored"),
        }
    }

    pub fn run_id(&self) -> Option<&DocumentId> {
        self.run_id.as_ref()
    }

    pub fn open_test(&self) -> Option<&TestIdentity> {
        self.open.as_ref().map(|open| &open.identity)
    }

    pub fn failed_tests(&self) -> &FailedTests {
        &self.failed
    }

    fn ensure_running(&self) -> ReportResult<()> {
        match self.phase {
            Phase::Running => Ok(()),
            Phase::NotStarted => Err(ContractViolation::RunNotStarted.into()),
            Phase::Ended => Err(ContractViolation::RunEnded.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::models::RunStatus;
    use crate::store::{DiscardStore, InMemoryStore, OpKind, RESULT_COLLECTION, RUN_COLLECTION};
    use crate::tracker::RunAggregator;
    use serde_json::json;
    use tempfile::TempDir;

    fn reporter(store: &Arc<InMemoryStore>) -> Reporter<InMemoryStore> {
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());
        reporter.on_run_start(RunPlan::new("api")).unwrap();
        reporter
    }

    fn run_test(
        reporter: &mut Reporter<InMemoryStore>,
        identity: TestIdentity,
        outcome: Outcome,
    ) -> TestStart {
        let start = reporter.on_test_start(identity).unwrap();
        if !start.is_skipped() {
            reporter.on_test_end(outcome, None, None).unwrap();
        }
        start
    }

    fn results(store: &InMemoryStore) -> Vec<serde_json::Value> {
        store.documents(RESULT_COLLECTION)
    }

    #[test]
    fn test_two_passing_tests() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);

        run_test(&mut reporter, TestIdentity::new("T", "test_a"), Outcome::Success);
        run_test(&mut reporter, TestIdentity::new("T", "test_b"), Outcome::Success);
        let run = reporter.on_run_end().unwrap();

        let docs = results(&store);
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d["status"] == "success"));
        assert_eq!(docs[1]["execution_order"], 2);
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.count(Outcome::Success), 2);
        assert_eq!(run.count(Outcome::Failure), 0);
        assert!(run.is_finished());
    }

    #[test]
    fn test_incremental_failure_skips_rest_of_group() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);

        let first = TestIdentity::new("Flow", "test_1").incremental();
        let second = TestIdentity::new("Flow", "test_2").incremental();
        let third = TestIdentity::new("Flow", "test_3").incremental();

        assert_eq!(run_test(&mut reporter, first, Outcome::Failure), TestStart::Proceed);
        assert!(run_test(&mut reporter, second, Outcome::Success).is_skipped());
        assert!(run_test(&mut reporter, third, Outcome::Success).is_skipped());
        let run = reporter.on_run_end().unwrap();

        let docs = results(&store);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["status"], "failure");
        for doc in &docs[1..] {
            assert_eq!(doc["status"], "skip");
            assert_eq!(doc["reason_skipped"], "previous test failed (Flow.test_1)");
        }
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.count(Outcome::Skip), 2);
    }

    #[test]
    fn test_non_incremental_tests_not_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);

        run_test(&mut reporter, TestIdentity::new("Plain", "test_1"), Outcome::Error);
        let start = run_test(&mut reporter, TestIdentity::new("Plain", "test_2"), Outcome::Success);
        assert_eq!(start, TestStart::Proceed);
    }

    #[test]
    fn test_group_resets_on_new_class() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);

        run_test(&mut reporter, TestIdentity::new("A", "test_1").incremental(), Outcome::Failure);
        let b = run_test(&mut reporter, TestIdentity::new("B", "test_1").incremental(), Outcome::Success);
        let a = run_test(&mut reporter, TestIdentity::new("A", "test_2").incremental(), Outcome::Success);
        assert_eq!(b, TestStart::Proceed);
        assert_eq!(a, TestStart::Proceed);
    }

    #[test]
    fn test_teardown_class_failure_adds_one_record() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);

        run_test(&mut reporter, TestIdentity::new("T", "test_a"), Outcome::Success);
        run_test(&mut reporter, TestIdentity::new("T", "test_b"), Outcome::Success);
        reporter
            .on_test_start(TestIdentity::fixture("tearDownClass", "T", None))
            .unwrap();
        reporter
            .on_test_end(Outcome::Error, Some("Traceback".into()), None)
            .unwrap();
        let run = reporter.on_run_end().unwrap();

        let docs = results(&store);
        let statuses: Vec<_> = docs.iter().map(|d| (d["full_name"].clone(), d["status"].clone())).collect();
        assert_eq!(
            statuses,
            vec![
                (json!("T.test_a"), json!("success")),
                (json!("T.test_b"), json!("success")),
                (json!("tearDownClass"), json!("error")),
            ]
        );
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(reporter.failed_tests().ids().collect::<Vec<_>>(), vec!["T"]);
    }

    #[test]
    fn test_sub_tests_flow_through() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(
            store.clone(),
            ReporterOptions::default().with_counting(CountingMode::SubTestGroups),
        );
        reporter.on_run_start(RunPlan::new("api")).unwrap();

        reporter.on_test_start(TestIdentity::new("T", "test_params")).unwrap();
        reporter.on_sub_test_end(json!({"n": 1}), Outcome::Success, None).unwrap();
        reporter.on_sub_test_end(json!({"n": 2}), Outcome::Failure, Some("assert".into())).unwrap();
        let record = reporter.on_test_end(Outcome::Success, None, None).unwrap();
        let run = reporter.on_run_end().unwrap();

        assert_eq!(record.sub_tests.len(), 2);
        assert_eq!(record.status, Outcome::Success);
        assert_eq!(run.tests_executed_count, 2);
        assert_eq!(
            reporter.failed_tests().ids().collect::<Vec<_>>(),
            vec!["T.test_params"]
        );
        let kinds: Vec<_> = store
            .operations()
            .into_iter()
            .filter(|op| op.collection == RESULT_COLLECTION)
            .map(|op| op.kind)
            .collect();
        assert_eq!(kinds, vec![OpKind::Insert, OpKind::Replace, OpKind::Replace]);
    }

    #[test]
    fn test_contract_violations() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());

        let violation = |err: ReportError| match err {
            ReportError::Contract(v) => v,
            other => panic!("unexpected error: {other}"),
        };

        assert_eq!(
            violation(reporter.on_test_start(TestIdentity::new("T", "a")).unwrap_err()),
            ContractViolation::RunNotStarted
        );
        reporter.on_run_start(RunPlan::new("api")).unwrap();
        assert_eq!(
            violation(reporter.on_run_start(RunPlan::new("api")).unwrap_err()),
            ContractViolation::RunAlreadyStarted
        );
        assert_eq!(
            violation(reporter.on_test_end(Outcome::Success, None, None).unwrap_err()),
            ContractViolation::NoOpenTest
        );

        reporter.on_test_start(TestIdentity::new("T", "a")).unwrap();
        assert!(matches!(
            violation(reporter.on_test_start(TestIdentity::new("T", "b")).unwrap_err()),
            ContractViolation::TestAlreadyOpen { .. }
        ));
        assert_eq!(
            violation(reporter.on_run_end().unwrap_err()),
            ContractViolation::TestStillOpen("T.a".to_string())
        );

        reporter.on_test_end(Outcome::Success, None, None).unwrap();
        assert_eq!(
            violation(reporter.on_sub_test_end(json!({}), Outcome::Success, None).unwrap_err()),
            ContractViolation::NoOpenTest
        );
        reporter.on_run_end().unwrap();
        assert_eq!(
            violation(reporter.on_run_end().unwrap_err()),
            ContractViolation::RunEnded
        );
    }

    #[test]
    fn test_store_failure_surfaces_from_test_end() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = reporter(&store);
        reporter.on_test_start(TestIdentity::new("T", "a")).unwrap();
        store.set_unavailable(true);

        let err = reporter.on_test_end(Outcome::Success, None, None).unwrap_err();
        assert!(matches!(err, ReportError::Store(_)));
    }

    #[test]
    fn test_failed_tests_file_written_at_run_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("failed.txt");
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(
            store.clone(),
            ReporterOptions::default().with_failed_tests_file(&path),
        );
        reporter.on_run_start(RunPlan::new("api")).unwrap();

        run_test(&mut reporter, TestIdentity::new("a.Flow", "test_1").incremental(), Outcome::Error);
        run_test(&mut reporter, TestIdentity::new("a.Flow", "test_2").incremental(), Outcome::Success);
        run_test(&mut reporter, TestIdentity::new("a.Plain", "test_x"), Outcome::Failure);
        run_test(&mut reporter, TestIdentity::new("a.Plain", "test_y"), Outcome::ExpectedFailure);
        reporter.on_run_end().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a.Flow\na.Plain.test_x"
        );
    }

    #[test]
    fn test_results_reference_run_and_components() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());
        let plan = RunPlan::new("api")
            .with_components(vec![VersionedComponent::new("console", "1.4")]);
        let run_id = reporter.on_run_start(plan).unwrap();

        reporter
            .on_test_start(TestIdentity::new("T", "a").with_components(["console"]))
            .unwrap();
        reporter.set_test_log("captured output").unwrap();
        let record = reporter.on_test_end(Outcome::Success, None, None).unwrap();

        assert_eq!(record.run_id, Some(run_id));
        assert_eq!(record.suite.as_deref(), Some("api"));
        assert_eq!(record.main_component.as_deref(), Some("console"));
        assert_eq!(record.components[0].version.as_deref(), Some("1.4"));
        assert_eq!(record.log.as_deref(), Some("captured output"));
        assert_eq!(store.count(RUN_COLLECTION), 1);
    }

    #[test]
    fn test_run_log_written_at_run_end() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());
        reporter.set_run_log("ignored before start");
        reporter.on_run_start(RunPlan::new("api")).unwrap();

        assert_eq!(reporter.open_test(), None);
        reporter.on_test_start(TestIdentity::new("T", "a")).unwrap();
        assert_eq!(reporter.open_test().map(|t| t.full_name.as_str()), Some("T.a"));
        reporter.on_test_end(Outcome::Success, None, None).unwrap();
        assert_eq!(reporter.open_test(), None);

        reporter.set_run_log("collected 1 item");
        let run = reporter.on_run_end().unwrap();

        assert_eq!(run.log.as_deref(), Some("collected 1 item"));
        let runs = store.documents(RUN_COLLECTION);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["log"], "collected 1 item");
    }

    #[test]
    fn test_discarding_store_accepts_external_run_id() {
        let store = Arc::new(DiscardStore::new());
        let mut reporter = Reporter::new(store, ReporterOptions::default());
        let id = DocumentId::new("65f0c0de0000000000000001");

        let run_id = reporter
            .on_run_start(RunPlan::new("api").resume(id.clone()))
            .unwrap();
        assert_eq!(run_id, id);

        reporter.on_test_start(TestIdentity::new("T", "a")).unwrap();
        reporter.on_test_end(Outcome::Failure, None, None).unwrap();
        let run = reporter.on_run_end().unwrap();
        assert_eq!(run.status, RunStatus::Failure);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shared_reporters_count_into_one_run() {
        let store = Arc::new(InMemoryStore::new());
        let (handle, task) = RunAggregator::spawn(store.clone(), CountingMode::PerTest, 2);

        let mut workers = Vec::new();
        for (class, outcome) in [("A", Outcome::Success), ("B", Outcome::Failure)] {
            let store = store.clone();
            let handle = handle.clone();
            workers.push(tokio::task::spawn_blocking(move || -> ReportResult<RunRecord> {
                let mut reporter = Reporter::shared(store, ReporterOptions::default(), handle);
                reporter.on_run_start(RunPlan::new("api"))?;
                reporter.on_test_start(TestIdentity::new(class, "test"))?;
                reporter.on_test_end(outcome, None, None)?;
                reporter.on_run_end()
            }));
        }
        for worker in workers {
            worker.await.unwrap().unwrap();
        }
        drop(handle);

        let run = task.await.unwrap().unwrap();
        assert!(run.is_finished());
        assert_eq!(run.tests_executed_count, 2);
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(store.count(RUN_COLLECTION), 1);
        assert_eq!(store.count(RESULT_COLLECTION), 2);
    }
}
