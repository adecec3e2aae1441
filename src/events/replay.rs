//! Drive the reporting hooks from recorded event streams

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::LifecycleEvent;
use crate::error::{ReportError, ReportResult};
use crate::models::RunRecord;
use crate::reporter::{FailedTests, Reporter, ReporterOptions, TestStart};
use crate::store::{DocumentId, DocumentStore};
use crate::tracker::RunAggregator;

/// What one replayed stream did
#[derive(Clone, Debug, Default)]
pub struct ReplayStats {
    pub run_id: Option<DocumentId>,
    pub events: usize,
    pub tests: usize,
    /// Tests vetoed by a blocked incremental group
    pub skipped: usize,
    /// Events dropped because their test was vetoed
    pub dropped: usize,
    pub failed: FailedTests,
    pub run: Option<RunRecord>,
}

/// Feed `events` through `reporter` in order.
///
/// Once a test is vetoed its remaining events, up to and including its
/// `test_end`, are dropped: the reporter already closed it.
pub fn replay<S, I>(reporter: &mut Reporter<S>, events: I) -> ReportResult<ReplayStats>
where
    S: DocumentStore + ?Sized,
    I: IntoIterator<Item = LifecycleEvent>,
{
    let mut stats = ReplayStats::default();
    let mut vetoed = false;

    for event in events {
        stats.events += 1;
        if vetoed {
            match event {
                LifecycleEvent::TestEnd { .. } => {
                    vetoed = false;
                    stats.dropped += 1;
                    continue;
                }
                LifecycleEvent::SubTestEnd { .. } | LifecycleEvent::TestLog { .. } => {
                    stats.dropped += 1;
                    continue;
                }
                // harness never sent test_end for the vetoed test
                _ => vetoed = false,
            }
        }

        match event {
            LifecycleEvent::RunStart(plan) => {
                stats.run_id = Some(reporter.on_run_start(plan)?);
            }
            LifecycleEvent::TestStart { test } => {
                stats.tests += 1;
                if let TestStart::Skipped { .. } = reporter.on_test_start(test)? {
                    stats.skipped += 1;
                    vetoed = true;
                }
            }
            LifecycleEvent::TestLog { text } => reporter.set_test_log(text)?,
            LifecycleEvent::SubTestEnd {
                params,
                outcome,
                stacktrace,
            } => reporter.on_sub_test_end(params, outcome, stacktrace)?,
            LifecycleEvent::TestEnd {
                outcome,
                stacktrace,
                reason_skipped,
            } => {
                reporter.on_test_end(outcome, stacktrace, reason_skipped)?;
            }
            LifecycleEvent::RunEnd => {
                stats.run = Some(reporter.on_run_end()?);
            }
        }
    }

    stats.failed = reporter.failed_tests().clone();
    debug!(
        "Replayed {} events ({} tests, {} skipped)",
        stats.events, stats.tests, stats.skipped
    );
    Ok(stats)
}

/// Result of replaying several streams into one run
#[derive(Clone, Debug)]
pub struct WorkersReport {
    pub run: RunRecord,
    pub workers: Vec<ReplayStats>,
    pub failed: FailedTests,
}

/// Replay several streams concurrently as workers of one shared run.
///
/// Each stream gets its own blocking worker and [`Reporter`]; run counters
/// go through a single [`RunAggregator`]. The merged failed-test list is
/// written once, after every worker finished.
pub async fn replay_workers<S>(
    store: Arc<S>,
    options: ReporterOptions,
    streams: Vec<Vec<LifecycleEvent>>,
) -> ReportResult<WorkersReport>
where
    S: DocumentStore + ?Sized + 'static,
{
    let (handle, aggregator) =
        RunAggregator::spawn(store.clone(), options.counting, streams.len());
    let worker_options = ReporterOptions {
        failed_tests_file: None,
        ..options.clone()
    };

    info!("Replaying {} streams as concurrent workers", streams.len());
    let tasks: Vec<_> = streams
        .into_iter()
        .enumerate()
        .map(|(index, events)| {
            let store = store.clone();
            let options = worker_options.clone();
            let handle = handle.clone();
            tokio::task::spawn_blocking(move || {
                debug!("Worker {index} replaying {} events", events.len());
                let mut reporter = Reporter::shared(store, options, handle);
                replay(&mut reporter, events)
            })
        })
        .collect();
    drop(handle);

    let mut workers = Vec::new();
    let mut first_error = None;
    for joined in join_all(tasks).await {
        match joined.map_err(ReportError::from).and_then(|result| result) {
            Ok(stats) => workers.push(stats),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    // the aggregator drains before any error is returned; a worker's own
    // error explains an aggregator that never started a run
    let run = aggregator.await;
    if let Some(e) = first_error {
        return Err(e);
    }
    let run = run??;

    let mut failed = FailedTests::new();
    for stats in &workers {
        failed.merge(&stats.failed);
    }
    if let Some(path) = &options.failed_tests_file {
        failed.write(path)?;
    }

    Ok(WorkersReport {
        run,
        workers,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, RunPlan, RunStatus, TestIdentity};
    use crate::store::{InMemoryStore, StoreError, RESULT_COLLECTION, RUN_COLLECTION};
    use serde_json::json;
    use tempfile::TempDir;

    fn test(class: &str, method: &str, incremental: bool) -> LifecycleEvent {
        let identity = TestIdentity::new(class, method);
        LifecycleEvent::TestStart {
            test: if incremental {
                identity.incremental()
            } else {
                identity
            },
        }
    }

    fn end(outcome: Outcome) -> LifecycleEvent {
        LifecycleEvent::TestEnd {
            outcome,
            stacktrace: None,
            reason_skipped: None,
        }
    }

    fn incremental_stream(class: &str, first: Outcome) -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::RunStart(RunPlan::new("api")),
            test(class, "test_1", true),
            end(first),
            test(class, "test_2", true),
            LifecycleEvent::SubTestEnd {
                params: json!({"n": 1}),
                outcome: Outcome::Success,
                stacktrace: None,
            },
            end(Outcome::Success),
            LifecycleEvent::RunEnd,
        ]
    }

    #[test]
    fn test_replay_drops_vetoed_events() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());

        let stats = replay(&mut reporter, incremental_stream("Flow", Outcome::Failure)).unwrap();

        assert_eq!(stats.tests, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.dropped, 2);
        let run = stats.run.unwrap();
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.count(Outcome::Skip), 1);

        let docs = store.documents(RESULT_COLLECTION);
        assert_eq!(docs[1]["status"], "skip");
        assert_eq!(docs[1]["sub_tests"], json!([]));
    }

    #[test]
    fn test_replay_passing_group_runs_everything() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store.clone(), ReporterOptions::default());

        let stats = replay(&mut reporter, incremental_stream("Flow", Outcome::Success)).unwrap();
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.run.unwrap().status, RunStatus::Success);
    }

    #[test]
    fn test_replay_stops_on_contract_violation() {
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = Reporter::new(store, ReporterOptions::default());

        let events = vec![LifecycleEvent::RunStart(RunPlan::new("api")), end(Outcome::Success)];
        assert!(replay(&mut reporter, events).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replay_workers_surface_store_error() {
        let store = Arc::new(InMemoryStore::new());
        store.set_unavailable(true);

        let streams = vec![
            incremental_stream("a.Flow", Outcome::Success),
            incremental_stream("b.Flow", Outcome::Success),
        ];
        let err = replay_workers(store, ReporterOptions::default(), streams)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replay_workers_share_run() {
        let dir = TempDir::new().unwrap();
        let failed_path = dir.path().join("failed.txt");
        let store = Arc::new(InMemoryStore::new());
        let options = ReporterOptions::default().with_failed_tests_file(&failed_path);

        let streams = vec![
            incremental_stream("a.Flow", Outcome::Failure),
            incremental_stream("b.Flow", Outcome::Success),
        ];
        let report = replay_workers(store.clone(), options, streams).await.unwrap();

        assert_eq!(report.workers.len(), 2);
        assert!(report.run.is_finished());
        assert_eq!(report.run.tests_executed_count, 4);
        assert_eq!(report.run.status, RunStatus::Failure);
        assert_eq!(store.count(RUN_COLLECTION), 1);
        assert_eq!(store.count(RESULT_COLLECTION), 4);
        assert_eq!(std::fs::read_to_string(failed_path).unwrap(), "a.Flow");
    }
}
