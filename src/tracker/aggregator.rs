//! Shared run aggregation
//!
//! Several workers reporting into one run document would overwrite each
//! other's counters. The aggregator is a single task owning the one
//! [`RunTracker`]; workers send it commands through an [`AggregatorHandle`]
//! and wait for the reply, so store errors still reach each worker.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{CountingMode, RunTracker};
use crate::error::{ContractViolation, ReportError, ReportResult};
use crate::models::{Outcome, RunPlan, RunRecord};
use crate::store::{DocumentId, DocumentStore};

enum Command {
    Begin {
        plan: RunPlan,
        reply: oneshot::Sender<ReportResult<DocumentId>>,
    },
    Record {
        outcome: Outcome,
        sub_test_group: Option<String>,
        reply: oneshot::Sender<ReportResult<()>>,
    },
    Finish {
        reply: oneshot::Sender<ReportResult<RunRecord>>,
    },
}

/// Cloneable sender side of a running aggregator.
///
/// Every method blocks until the aggregator replies; call them from
/// blocking threads, never from inside an async task.
#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Begin { .. } => f.write_str("Begin"),
            Command::Record { outcome, .. } => write!(f, "Record({outcome})"),
            Command::Finish { .. } => f.write_str("Finish"),
        }
    }
}

impl AggregatorHandle {
    /// Join the run, starting it on the first call. Returns the run id.
    pub fn begin(&self, plan: RunPlan) -> ReportResult<DocumentId> {
        self.request(|reply| Command::Begin { plan, reply })
    }

    /// Count one completed test
    pub fn record(&self, outcome: Outcome, sub_test_group: Option<&str>) -> ReportResult<()> {
        let sub_test_group = sub_test_group.map(str::to_string);
        self.request(|reply| Command::Record {
            outcome,
            sub_test_group,
            reply,
        })
    }

    /// Leave the run. The last worker to leave ends it.
    pub fn finish(&self) -> ReportResult<RunRecord> {
        self.request(|reply| Command::Finish { reply })
    }

    fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<ReportResult<T>>) -> Command,
    ) -> ReportResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| ReportError::AggregatorClosed)?;
        rx.blocking_recv()
            .map_err(|_| ReportError::AggregatorClosed)?
    }
}

/// Single owner of a shared run document
pub struct RunAggregator<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    counting: CountingMode,
    tracker: Option<RunTracker<S>>,
    workers: usize,
    joined: usize,
    finished: usize,
    ended: bool,
}

impl<S: DocumentStore + ?Sized + 'static> RunAggregator<S> {
    /// Spawn the aggregator on the blocking pool for `workers` workers.
    ///
    /// The run ends when the last of them finishes, so a fast worker can not
    /// close it before a slow one joined. The join handle resolves once every
    /// handle is dropped, with the final run record.
    pub fn spawn(
        store: Arc<S>,
        counting: CountingMode,
        workers: usize,
    ) -> (AggregatorHandle, JoinHandle<ReportResult<RunRecord>>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut aggregator = Self {
            store,
            counting,
            tracker: None,
            workers: workers.max(1),
            joined: 0,
            finished: 0,
            ended: false,
        };

        let task = tokio::task::spawn_blocking(move || {
            while let Some(command) = rx.blocking_recv() {
                debug!("Aggregator received {command:?}");
                aggregator.handle(command);
            }
            aggregator.into_record()
        });

        (AggregatorHandle { tx }, task)
    }

    fn handle(&mut self, command: Command) {
        // a dropped reply receiver only means the worker went away
        match command {
            Command::Begin { plan, reply } => {
                let _ = reply.send(self.begin(&plan));
            }
            Command::Record {
                outcome,
                sub_test_group,
                reply,
            } => {
                let _ = reply.send(self.record(outcome, sub_test_group.as_deref()));
            }
            Command::Finish { reply } => {
                let _ = reply.send(self.finish());
            }
        }
    }

    fn begin(&mut self, plan: &RunPlan) -> ReportResult<DocumentId> {
        if self.ended {
            return Err(ContractViolation::RunEnded.into());
        }
        if self.tracker.is_none() {
            self.tracker = Some(RunTracker::start(self.store.clone(), plan, self.counting)?);
        }
        self.joined += 1;
        debug!("Worker {} of {} joined", self.joined, self.workers);
        self.tracker()?
            .run_id()
            .cloned()
            .ok_or_else(|| ContractViolation::RunNotStarted.into())
    }

    fn record(&mut self, outcome: Outcome, sub_test_group: Option<&str>) -> ReportResult<()> {
        if self.ended {
            return Err(ContractViolation::RunEnded.into());
        }
        self.tracker()?.update_result(outcome, sub_test_group)
    }

    fn finish(&mut self) -> ReportResult<RunRecord> {
        if self.ended {
            return Err(ContractViolation::RunEnded.into());
        }
        // a worker that never joined has nothing to finish
        if self.finished == self.joined {
            return Err(ContractViolation::RunNotStarted.into());
        }
        self.finished += 1;
        let last = self.finished == self.workers;
        let tracker = self.tracker()?;
        if last {
            tracker.end()?;
            self.ended = true;
            info!("Last worker finished, run closed");
        }
        Ok(self.tracker()?.record().clone())
    }

    fn tracker(&mut self) -> ReportResult<&mut RunTracker<S>> {
        self.tracker
            .as_mut()
            .ok_or_else(|| ContractViolation::RunNotStarted.into())
    }

    fn into_record(self) -> ReportResult<RunRecord> {
        self.tracker
            .map(|tracker| tracker.record().clone())
            .ok_or_else(|| ContractViolation::RunNotStarted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use crate::store::{InMemoryStore, RUN_COLLECTION};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_workers_share_one_run() {
        let store = Arc::new(InMemoryStore::new());
        let (handle, task) = RunAggregator::spawn(store.clone(), CountingMode::PerTest, 3);

        let mut workers = Vec::new();
        for outcome in [Outcome::Success, Outcome::Failure, Outcome::Success] {
            let handle = handle.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                let id = handle.begin(RunPlan::new("smoke"))?;
                handle.record(outcome, None)?;
                Ok::<_, ReportError>(id)
            }));
        }

        let mut ids = Vec::new();
        for worker in workers {
            ids.push(worker.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let finisher = handle.clone();
        let finals = tokio::task::spawn_blocking(move || {
            (0..3).map(|_| finisher.finish().unwrap()).collect::<Vec<_>>()
        })
        .await
        .unwrap();
        assert!(!finals[1].is_finished());
        assert!(finals[2].is_finished());

        drop(handle);
        let record = task.await.unwrap().unwrap();
        assert_eq!(record.tests_executed_count, 3);
        assert_eq!(record.count(Outcome::Success), 2);
        assert_eq!(record.status, RunStatus::Failure);
        assert_eq!(store.count(RUN_COLLECTION), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_record_before_begin() {
        let store = Arc::new(InMemoryStore::new());
        let (handle, task) = RunAggregator::spawn(store, CountingMode::PerTest, 1);

        let result = tokio::task::spawn_blocking(move || handle.record(Outcome::Success, None))
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(ReportError::Contract(ContractViolation::RunNotStarted))
        ));

        // handle dropped without any run
        assert_err!(task.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_begin_after_run_closed() {
        let store = Arc::new(InMemoryStore::new());
        let (handle, task) = RunAggregator::spawn(store, CountingMode::PerTest, 1);

        let result = tokio::task::spawn_blocking(move || {
            assert_ok!(handle.begin(RunPlan::new("smoke")));
            assert_ok!(handle.finish());
            handle.begin(RunPlan::new("smoke"))
        })
        .await
        .unwrap();
        assert!(matches!(
            result,
            Err(ReportError::Contract(ContractViolation::RunEnded))
        ));
        assert_ok!(task.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_early_finish_keeps_run_open() {
        let store = Arc::new(InMemoryStore::new());
        let (handle, task) = RunAggregator::spawn(store, CountingMode::PerTest, 2);

        let records = tokio::task::spawn_blocking(move || {
            handle.begin(RunPlan::new("smoke"))?;
            handle.record(Outcome::Success, None)?;
            let first = handle.finish()?;
            handle.begin(RunPlan::new("smoke"))?;
            handle.record(Outcome::Skip, None)?;
            let second = handle.finish()?;
            Ok::<_, ReportError>((first, second))
        })
        .await
        .unwrap();

        let (first, second) = assert_ok!(records);
        assert!(!first.is_finished());
        assert!(second.is_finished());
        assert_eq!(second.tests_executed_count, 2);
        assert_ok!(task.await.unwrap());
    }

    #[test]
    fn test_closed_aggregator() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = AggregatorHandle { tx };
        assert!(matches!(
            handle.finish(),
            Err(ReportError::AggregatorClosed)
        ));
    }
}
