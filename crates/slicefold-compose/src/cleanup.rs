//! Concurrent, paced deletion of folded slices.
//!
//! The composer hands each chunk's slices to a [`CleanupDispatcher`] right
//! after the compose call that consumed them succeeds. Dispatching never
//! blocks the composer: batches go through an unbounded channel to a feeder
//! task, which submits one deletion at a time to a semaphore-bounded
//! [`JoinSet`] and pauses for the dispatch delay between submissions so the
//! provider sees a ramp rather than a burst.
//!
//! A deletion that fails with `NotFound` counts as success, since the goal
//! (the slice is gone) holds. Any other failure is logged and recorded in the
//! [`CleanupReport`]; it never stops other deletions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use slicefold_core::{ComposeConfig, ObjectPath, ObjectRef};
use slicefold_storage::{StorageGateway, StorageResult};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A slice that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    /// The slice left behind.
    pub path: ObjectPath,
    /// Rendered error.
    pub error: String,
}

/// Outcome of the deletions a dispatcher performed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Deletions handed to the pool.
    pub submitted: usize,
    /// Slices removed by this dispatcher.
    pub deleted: usize,
    /// Slices that were already gone.
    pub already_absent: usize,
    /// Slices that could not be removed.
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Whether every completed deletion succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Deletions that finished, successfully or not.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.deleted + self.already_absent + self.failures.len()
    }

    fn record(&mut self, path: ObjectPath, result: StorageResult<()>) {
        match result {
            Ok(()) => {
                trace!(path = %path, "deleted slice");
                self.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path, "slice already absent");
                self.already_absent += 1;
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to delete slice");
                self.failures.push(CleanupFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Background pool that deletes slices with bounded concurrency.
///
/// Must be created inside a Tokio runtime. Call [`join`](Self::join) to wait
/// for every dispatched deletion; dropping the dispatcher instead lets the
/// pending deletions finish in the background.
#[derive(Debug)]
pub struct CleanupDispatcher {
    sender: mpsc::UnboundedSender<Vec<ObjectRef>>,
    feeder: JoinHandle<()>,
    report: Arc<Mutex<CleanupReport>>,
}

impl CleanupDispatcher {
    /// Start a dispatcher running at most `concurrency` deletions at once,
    /// waiting `delay` between two submissions.
    #[must_use]
    pub fn spawn(
        gateway: Arc<dyn StorageGateway>,
        concurrency: usize,
        delay: Duration,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let report = Arc::new(Mutex::new(CleanupReport::default()));
        let feeder = Feeder {
            gateway,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            delay,
            report: Arc::clone(&report),
        };
        debug!(concurrency, delay_ms = delay.as_millis(), "starting cleanup dispatcher");
        Self {
            sender,
            feeder: tokio::spawn(feeder.run(receiver)),
            report,
        }
    }

    /// Start a dispatcher with the pool size and delay of `config`.
    #[must_use]
    pub fn from_config(gateway: Arc<dyn StorageGateway>, config: &ComposeConfig) -> Self {
        Self::spawn(gateway, config.cleanup_concurrency, config.dispatch_delay())
    }

    /// Queue `slices` for deletion. Returns immediately.
    pub fn dispatch(&self, slices: Vec<ObjectRef>) {
        if slices.is_empty() {
            return;
        }
        let count = slices.len();
        if let Err(mpsc::error::SendError(lost)) = self.sender.send(slices) {
            // Only reachable if the feeder task died.
            error!(count = lost.len(), "cleanup feeder gone, slices not queued");
            return;
        }
        trace!(count, "queued slices for deletion");
    }

    /// Snapshot of the deletions completed so far.
    #[must_use]
    pub fn progress(&self) -> CleanupReport {
        self.report.lock().clone()
    }

    /// Wait until every dispatched deletion has finished.
    pub async fn join(self) -> CleanupReport {
        let Self {
            sender,
            feeder,
            report,
        } = self;
        drop(sender);
        if let Err(e) = feeder.await {
            error!(error = %e, "cleanup feeder terminated abnormally");
        }
        let report = report.lock().clone();
        info!(
            submitted = report.submitted,
            deleted = report.deleted,
            already_absent = report.already_absent,
            failed = report.failures.len(),
            "cleanup finished"
        );
        report
    }

    /// Stop submitting and cancel the deletions in flight.
    ///
    /// Deletions already acknowledged by the provider stay deleted; the
    /// report covers only the ones that completed before the abort.
    pub async fn abort(self) -> CleanupReport {
        self.feeder.abort();
        if let Err(e) = self.feeder.await {
            if !e.is_cancelled() {
                error!(error = %e, "cleanup feeder terminated abnormally");
            }
        }
        let report = self.report.lock().clone();
        warn!(
            submitted = report.submitted,
            completed = report.completed(),
            "cleanup aborted"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Feeder task
// ---------------------------------------------------------------------------

struct Feeder {
    gateway: Arc<dyn StorageGateway>,
    semaphore: Arc<Semaphore>,
    delay: Duration,
    report: Arc<Mutex<CleanupReport>>,
}

impl Feeder {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Vec<ObjectRef>>) {
        let mut tasks: JoinSet<StorageResult<()>> = JoinSet::new();
        let mut pending: HashMap<task::Id, ObjectPath> = HashMap::new();

        while let Some(batch) = receiver.recv().await {
            for slice in batch {
                // The semaphore is never closed.
                let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                    return;
                };
                let gateway = Arc::clone(&self.gateway);
                let path = slice.path.clone();
                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    gateway.delete(&slice).await
                });
                pending.insert(handle.id(), path);
                self.report.lock().submitted += 1;

                while let Some(joined) = tasks.try_join_next_with_id() {
                    self.settle(&mut pending, joined);
                }
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            self.settle(&mut pending, joined);
        }
    }

    fn settle(
        &self,
        pending: &mut HashMap<task::Id, ObjectPath>,
        joined: Result<(task::Id, StorageResult<()>), JoinError>,
    ) {
        match joined {
            Ok((id, result)) => {
                if let Some(path) = pending.remove(&id) {
                    self.report.lock().record(path, result);
                }
            }
            Err(e) => {
                if let Some(path) = pending.remove(&e.id()) {
                    error!(path = %path, error = %e, "slice deletion task failed");
                    self.report.lock().failures.push(CleanupFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
