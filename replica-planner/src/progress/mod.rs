//! Reassignment progress tracking.
//!
//! Two periodic tasks run while the tracker is started:
//! - the reassignment task polls live reassignments and recomputes every tracked state
//! - the cluster task refreshes partition log-dir details of the tracked topics
//!
//! Both tasks fire immediately on start, then on their configured intervals. A failed
//! collaborator call is logged and retried on the next tick, the previous state stays
//! visible in the meantime.

mod client;
mod state;

#[cfg(test)]
mod tracker_test;

pub use client::{ClusterClient, PartitionCache};
pub use state::{
    LiveReassignment, PartitionProgress, ReassignmentId, ReassignmentState, RemainingSample,
};

use metrics::{counter, gauge};
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::planner_metrics::{TRACKER_FETCH_FAILURES_TOTAL, TRACKER_TRACKED_REASSIGNMENTS};
use state::ReassignmentBook;

pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
    tasks: std::sync::Mutex<Option<TrackerTasks>>,
}

struct TrackerInner {
    client: Arc<dyn ClusterClient>,
    cache: PartitionCache,
    book: Mutex<ReassignmentBook>,
    // held from fetch to apply, so poll results land in fetch order
    poll_lock: Mutex<()>,
    config: TrackerConfig,
}

struct TrackerTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ProgressTracker {
    /// `cache` must be the same cache the client writes partition details into.
    pub fn new(client: Arc<dyn ClusterClient>, cache: PartitionCache, config: TrackerConfig) -> Self {
        ProgressTracker {
            inner: Arc::new(TrackerInner {
                client,
                cache,
                book: Mutex::new(ReassignmentBook::default()),
                poll_lock: Mutex::new(()),
                config,
            }),
            tasks: std::sync::Mutex::new(None),
        }
    }

    /// Starts the periodic refresh tasks. Must be called from within a tokio runtime.
    ///
    /// Returns `false` when the tracker was already running.
    pub fn start(&self) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_some() {
            debug!("progress tracker already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let reassignments = {
            let inner = Arc::clone(&self.inner);
            spawn_periodic(
                "reassignments",
                cancel.clone(),
                self.inner.config.reassignment_refresh_interval(),
                move || {
                    let inner = Arc::clone(&inner);
                    async move { inner.refresh_reassignments().await }
                },
            )
        };
        let cluster = {
            let inner = Arc::clone(&self.inner);
            spawn_periodic(
                "cluster",
                cancel.clone(),
                self.inner.config.cluster_refresh_interval(),
                move || {
                    let inner = Arc::clone(&inner);
                    async move { inner.refresh_cluster().await }
                },
            )
        };

        info!(
            reassignment_refresh_seconds = self.inner.config.reassignment_refresh_seconds,
            cluster_refresh_seconds = self.inner.config.cluster_refresh_seconds,
            "progress tracker started"
        );
        *tasks = Some(TrackerTasks {
            cancel,
            handles: vec![reassignments, cluster],
        });
        true
    }

    /// Cancels both tasks. Calling it on a stopped tracker does nothing.
    pub fn stop(&self) {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tasks) = tasks {
            tasks.cancel.cancel();
            // the tasks exit at their next await point, nothing to join
            drop(tasks.handles);
            info!("progress tracker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs one reassignment poll outside the periodic schedule. Polls are serialized
    /// with the periodic task, so a slower earlier fetch never overwrites a newer one.
    pub async fn refresh_reassignments(&self) {
        self.inner.refresh_reassignments().await;
    }

    /// Runs one partition details refresh outside the periodic schedule.
    pub async fn refresh_cluster(&self) {
        self.inner.refresh_cluster().await;
    }

    /// Tracked reassignments, completed ones still inside their grace period included.
    pub async fn reassignments(&self) -> Vec<ReassignmentState> {
        self.inner.book.lock().await.states().cloned().collect()
    }

    pub async fn reassignment(&self, id: ReassignmentId) -> Option<ReassignmentState> {
        self.inner.book.lock().await.get(id).cloned()
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl TrackerInner {
    async fn refresh_reassignments(&self) {
        let _poll = self.poll_lock.lock().await;
        let live = match self.client.fetch_live_reassignments(true).await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "failed to fetch live reassignments, keeping previous state");
                counter!(TRACKER_FETCH_FAILURES_TOTAL.name, "call" => "live_reassignments")
                    .increment(1);
                return;
            }
        };
        let details = self.cache.snapshot().await;

        let mut book = self.book.lock().await;
        book.apply_tick(
            &live,
            &details,
            SystemTime::now(),
            self.config.completed_grace(),
        );
        gauge!(TRACKER_TRACKED_REASSIGNMENTS.name).set(book.len() as f64);
    }

    async fn refresh_cluster(&self) {
        let topics = self.book.lock().await.live_topics();
        if topics.is_empty() {
            return;
        }
        if let Err(e) = self.client.fetch_partition_details(&topics, true).await {
            warn!(
                error = %e,
                topics = ?topics,
                "failed to refresh partition details, keeping cached sizes"
            );
            counter!(TRACKER_FETCH_FAILURES_TOTAL.name, "call" => "partition_details")
                .increment(1);
        }
    }
}

/// Runs `tick` right away and then every `period` until `cancel` fires.
/// An in-flight tick is abandoned on cancellation.
fn spawn_periodic<F, Fut>(
    task: &'static str,
    cancel: CancellationToken,
    period: Duration,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(task, "tracker task cancelled");
                    break;
                }
                _ = async {
                    ticker.tick().await;
                    tick().await;
                } => {}
            }
        }
    })
}
