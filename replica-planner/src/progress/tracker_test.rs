//! Tests for reassignment progress tracking
//!
//! The first group drives `ReassignmentBook::apply_tick` with a simulated clock:
//! - transfer sizes, remaining bytes and progress from partition log-dir sizes
//! - remaining samples, speed and completion estimates
//! - completion, grace-period removal and revival
//!
//! The second group runs `ProgressTracker` against an in-memory cluster client.

use super::state::ReassignmentBook;
use super::*;
use crate::cluster::{BrokerId, LogDirEntry, Partition, PartitionId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;
use tokio::sync::Notify;

const GRACE: Duration = Duration::from_secs(10);

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

fn partition(id: PartitionId, sizes: &[(BrokerId, u64)]) -> Partition {
    Partition {
        id,
        replicas: sizes.iter().map(|(b, _)| *b).collect(),
        replica_size: 0,
        log_dir_sizes: sizes
            .iter()
            .map(|(b, size)| (*b, LogDirEntry::ok(*size)))
            .collect(),
    }
}

fn live(
    topic: &str,
    partition: PartitionId,
    replicas: &[BrokerId],
    adding: &[BrokerId],
) -> LiveReassignment {
    LiveReassignment {
        topic: topic.to_string(),
        partition,
        replicas: replicas.to_vec(),
        adding_replicas: adding.to_vec(),
        removing_replicas: vec![],
    }
}

fn details(topic: &str, partitions: Vec<Partition>) -> HashMap<String, Vec<Partition>> {
    HashMap::from([(topic.to_string(), partitions)])
}

fn state<'a>(book: &'a ReassignmentBook, topic: &str) -> &'a ReassignmentState {
    book.get(ReassignmentId::for_topic(topic))
        .expect("reassignment must be tracked")
}

// ============================================================================
// Progress Computation Tests
// ============================================================================

/// **Test:** Progress From Log-Dir Sizes
///
/// **Reason:** The transfer size of a partition is its largest healthy replica times the
/// number of adding replicas, and what is already on the adding replicas counts as done.
///
/// **Expectation:** Leader at 1000 bytes, new replica at 200: 800 remaining, 20% done.
#[test]
fn test_progress_from_log_dir_sizes() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];
    let cache = details("orders", vec![partition(0, &[(1, 1000), (4, 200)])]);

    book.apply_tick(&live_set, &cache, t(0), GRACE);

    let orders = state(&book, "orders");
    let progress = &orders.partitions[&0];
    assert_eq!(progress.max_replica_size, 1000);
    assert_eq!(progress.current_size, BTreeMap::from([(4, 200)]));
    assert_eq!(orders.total_transfer_size, 1000);
    assert_eq!(orders.remaining.map(|r| r.bytes), Some(800));
    assert_eq!(orders.progress_percent, 20.0);
    assert!(orders.remaining_prev.is_none());
    assert!(orders.estimate_speed.is_none());
    assert!(orders.estimate_completion_time.is_none());
    assert!(!orders.is_completed());
}

/// **Test:** Errored and Unreported Log Dirs
///
/// **Reason:** An offline log dir reports a size that cannot be trusted, and a new
/// replica may not have reported anything yet.
///
/// **Expectation:** The errored leader entry is ignored for the maximum and the adding
/// replica without a healthy entry counts as zero bytes.
#[test]
fn test_errored_and_unreported_log_dirs() {
    let mut book = ReassignmentBook::default();
    let mut detail = partition(0, &[(1, 5000), (2, 1000)]);
    detail.log_dir_sizes.insert(
        1,
        LogDirEntry {
            size: 5000,
            error: Some("KafkaStorageException".to_string()),
        },
    );
    detail.log_dir_sizes.insert(
        4,
        LogDirEntry {
            size: 700,
            error: Some("KafkaStorageException".to_string()),
        },
    );

    book.apply_tick(
        &[live("orders", 0, &[1, 2, 4], &[4])],
        &details("orders", vec![detail]),
        t(0),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert_eq!(orders.partitions[&0].max_replica_size, 1000);
    assert_eq!(orders.partitions[&0].current_size[&4], 0);
    assert_eq!(orders.remaining.map(|r| r.bytes), Some(1000));
}

/// **Test:** No Partition Details Yet
///
/// **Reason:** The cluster refresh runs on its own schedule, so a new reassignment can be
/// polled before its partition details are cached.
///
/// **Expectation:** Tracked with zero transfer size and zero progress, no panic.
#[test]
fn test_reassignment_without_partition_details() {
    let mut book = ReassignmentBook::default();
    book.apply_tick(
        &[live("orders", 0, &[1, 4], &[4])],
        &HashMap::new(),
        t(0),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert_eq!(orders.total_transfer_size, 0);
    assert_eq!(orders.progress_percent, 0.0);
    assert_eq!(orders.partitions[&0].current_size[&4], 0);
}

/// **Test:** Partitions Are Grouped by Topic
///
/// **Reason:** The cluster reports one entry per partition; progress is tracked per topic.
///
/// **Expectation:** Two partitions of `orders` share one state, `payments` gets its own,
/// and the ids are derived from the topic names.
#[test]
fn test_partitions_grouped_by_topic() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![
        live("orders", 0, &[1, 4], &[4]),
        live("payments", 0, &[2, 5], &[5]),
        live("orders", 1, &[2, 4], &[4]),
    ];
    book.apply_tick(&live_set, &HashMap::new(), t(0), GRACE);

    assert_eq!(book.len(), 2);
    let orders = state(&book, "orders");
    assert_eq!(orders.id, ReassignmentId::for_topic("orders"));
    assert_eq!(orders.partitions.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(book.live_topics(), vec!["orders".to_string(), "payments".to_string()]);
}

// ============================================================================
// Speed and Estimate Tests
// ============================================================================

/// **Test:** Unchanged Remaining Keeps the Previous Sample
///
/// **Reason:** Speed is derived from the last two distinct remaining values. Recording a
/// sample on every poll would collapse the window to zero whenever sizes stall.
///
/// **Expectation:** A second poll with identical sizes leaves both samples untouched.
#[test]
fn test_identical_remaining_does_not_shift_samples() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];
    let cache = details("orders", vec![partition(0, &[(1, 1000), (4, 200)])]);

    book.apply_tick(&live_set, &cache, t(0), GRACE);
    book.apply_tick(&live_set, &cache, t(4), GRACE);

    let orders = state(&book, "orders");
    assert_eq!(orders.remaining.map(|r| r.at), Some(t(0)));
    assert!(orders.remaining_prev.is_none());
    assert!(orders.estimate_speed.is_none());
}

/// **Test:** Speed and Completion Estimate
///
/// **Reason:** Validates speed = -(change in remaining) / elapsed seconds and the ETA
/// derived from it.
///
/// **Expectation:** 800 -> 400 bytes over 8 seconds is 50 B/s, so the remaining 400 bytes
/// finish 8 seconds after the last poll.
#[test]
fn test_speed_and_completion_estimate() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];

    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 1000), (4, 200)])]),
        t(0),
        GRACE,
    );
    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 1000), (4, 600)])]),
        t(8),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert_eq!(
        orders.remaining_prev,
        Some(RemainingSample { bytes: 800, at: t(0) })
    );
    assert_eq!(
        orders.remaining,
        Some(RemainingSample { bytes: 400, at: t(8) })
    );
    assert_eq!(orders.estimate_speed, Some(50.0));
    assert_eq!(orders.estimate_completion_time, Some(t(16)));
    assert_eq!(orders.progress_percent, 60.0);
}

/// **Test:** Growing Remaining Gives Negative Speed
///
/// **Reason:** When the leader receives writes faster than the new replica copies, the
/// remaining byte count grows.
///
/// **Expectation:** Speed is reported as negative and no completion time is estimated.
#[test]
fn test_growing_remaining_gives_negative_speed() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];

    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 1000), (4, 600)])]),
        t(0),
        GRACE,
    );
    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 2000), (4, 700)])]),
        t(2),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert_eq!(orders.remaining.map(|r| r.bytes), Some(1300));
    assert_eq!(orders.estimate_speed, Some(-450.0));
    assert!(orders.estimate_completion_time.is_none());
    assert_eq!(orders.progress_percent, 35.0);
}

/// **Test:** Stalled Transfer Gives No Completion Estimate
///
/// **Reason:** A transfer that stalls for days and then moves a single byte has a tiny
/// positive speed. Remaining divided by that speed is larger than any `Duration`, and the
/// estimate must not take the polling task down with it.
///
/// **Expectation:** Speed is positive, the ETA stays unset and later polls still work.
#[test]
fn test_stalled_transfer_leaves_eta_unset() {
    const TB: u64 = 1_000_000_000_000;
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];

    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 200 * TB), (4, 0)])]),
        t(0),
        GRACE,
    );
    book.apply_tick(
        &live_set,
        &details("orders", vec![partition(0, &[(1, 200 * TB), (4, 1)])]),
        t(3 * 24 * 3600),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert!(orders.estimate_speed.is_some_and(|speed| speed > 0.0));
    assert!(orders.estimate_completion_time.is_none());

    book.apply_tick(&[], &HashMap::new(), t(3 * 24 * 3600 + 4), GRACE);
    assert!(state(&book, "orders").is_completed());
}

// ============================================================================
// Completion Lifecycle Tests
// ============================================================================

/// **Test:** Completion and Grace Period
///
/// **Reason:** A reassignment that is no longer live has finished. It stays visible for
/// the grace period so callers can observe the completion.
///
/// **Expectation:** Completed at the first poll without it, still present exactly 10s
/// later, removed once more than 10s have passed.
#[test]
fn test_completion_and_grace_period_removal() {
    let mut book = ReassignmentBook::default();
    let cache = details("orders", vec![partition(0, &[(1, 1000), (4, 200)])]);

    book.apply_tick(&[live("orders", 0, &[1, 4], &[4])], &cache, t(0), GRACE);
    book.apply_tick(&[], &cache, t(4), GRACE);

    let orders = state(&book, "orders");
    assert_eq!(orders.actual_time_completed, Some(t(4)));
    assert_eq!(orders.progress_percent, 100.0);
    assert!(orders.estimate_completion_time.is_none());
    assert!(book.live_topics().is_empty());

    book.apply_tick(&[], &cache, t(14), GRACE);
    assert_eq!(book.len(), 1);

    book.apply_tick(&[], &cache, t(15), GRACE);
    assert_eq!(book.len(), 0);
}

/// **Test:** Partially Finished Topic Stays Live
///
/// **Reason:** Partitions of one topic finish at different times; the topic is only done
/// when none of its partitions is reported any more.
///
/// **Expectation:** After partition 1 disappears the topic is still live and partition 1
/// is kept in the state.
#[test]
fn test_partially_finished_topic_stays_live() {
    let mut book = ReassignmentBook::default();
    book.apply_tick(
        &[
            live("orders", 0, &[1, 4], &[4]),
            live("orders", 1, &[2, 4], &[4]),
        ],
        &HashMap::new(),
        t(0),
        GRACE,
    );
    book.apply_tick(
        &[live("orders", 0, &[1, 4], &[4])],
        &HashMap::new(),
        t(4),
        GRACE,
    );

    let orders = state(&book, "orders");
    assert!(!orders.is_completed());
    assert_eq!(orders.partitions.len(), 2);
}

/// **Test:** Completed Reassignment Reported Again
///
/// **Reason:** A new reassignment of the same topic can start inside the grace period.
///
/// **Expectation:** The state is live again and no completion time is set.
#[test]
fn test_completed_reassignment_is_revived() {
    let mut book = ReassignmentBook::default();
    let live_set = vec![live("orders", 0, &[1, 4], &[4])];

    book.apply_tick(&live_set, &HashMap::new(), t(0), GRACE);
    book.apply_tick(&[], &HashMap::new(), t(4), GRACE);
    assert!(state(&book, "orders").is_completed());

    book.apply_tick(&live_set, &HashMap::new(), t(6), GRACE);
    let orders = state(&book, "orders");
    assert!(!orders.is_completed());
    assert!(orders.actual_time_completed.is_none());
}

// ============================================================================
// ProgressTracker Tests
// ============================================================================

#[derive(Default)]
struct MockClient {
    cache: PartitionCache,
    live: std::sync::Mutex<Vec<LiveReassignment>>,
    details: std::sync::Mutex<HashMap<String, Vec<Partition>>>,
    fail_live: AtomicBool,
    live_calls: AtomicUsize,
    detail_requests: std::sync::Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ClusterClient for MockClient {
    async fn fetch_live_reassignments(
        &self,
        _force_refresh: bool,
    ) -> anyhow::Result<Vec<LiveReassignment>> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_live.load(Ordering::SeqCst) {
            anyhow::bail!("cluster unavailable");
        }
        Ok(self.live.lock().unwrap().clone())
    }

    async fn fetch_partition_details(
        &self,
        topic_names: &[String],
        _force_refresh: bool,
    ) -> anyhow::Result<()> {
        self.detail_requests.lock().unwrap().push(topic_names.to_vec());
        let known = self.details.lock().unwrap().clone();
        for topic in topic_names {
            if let Some(partitions) = known.get(topic) {
                self.cache.update(topic, partitions.clone()).await;
            }
        }
        Ok(())
    }
}

fn tracker_with(config: TrackerConfig) -> (Arc<MockClient>, ProgressTracker) {
    let client = Arc::new(MockClient::default());
    *client.live.lock().unwrap() = vec![live("orders", 0, &[1, 4], &[4])];
    let tracker = ProgressTracker::new(client.clone(), client.cache.clone(), config);
    (client, tracker)
}

/// **Test:** Start Is Idempotent and Polls Immediately
///
/// **Reason:** Callers may start the tracker more than once; a second set of tasks would
/// double the polling load.
///
/// **Expectation:** The second start reports false, the first poll happens right away, and
/// no further polls happen after stop.
#[tokio::test]
async fn test_start_is_idempotent_and_stop_cancels() {
    let (client, tracker) = tracker_with(TrackerConfig {
        reassignment_refresh_seconds: 1,
        ..Default::default()
    });

    assert!(tracker.start());
    assert!(!tracker.start());
    assert!(tracker.is_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.live_calls.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.reassignments().await.len(), 1);

    tracker.stop();
    assert!(!tracker.is_running());
    tracker.stop();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(client.live_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_before_start_is_noop() {
    let (_client, tracker) = tracker_with(TrackerConfig::default());
    tracker.stop();
    assert!(!tracker.is_running());
}

/// **Test:** Failed Poll Keeps Previous State
///
/// **Reason:** Collaborator failures are transient; the tracker must neither drop nor
/// complete reassignments because one poll failed.
///
/// **Expectation:** After a failed poll the reassignment is still tracked and live.
#[tokio::test]
async fn test_failed_poll_keeps_previous_state() {
    let (client, tracker) = tracker_with(TrackerConfig::default());

    tracker.refresh_reassignments().await;
    let before = tracker.reassignments().await;

    client.fail_live.store(true, Ordering::SeqCst);
    tracker.refresh_reassignments().await;

    assert_eq!(client.live_calls.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.reassignments().await, before);
    assert!(!before[0].is_completed());
}

/// **Test:** Cluster Refresh Feeds the Next Poll
///
/// **Reason:** Partition details are fetched for tracked topics only and reach the
/// progress computation through the shared cache.
///
/// **Expectation:** The refresh asks for `orders` only, and the following poll picks up
/// the cached sizes.
#[tokio::test]
async fn test_cluster_refresh_feeds_next_poll() {
    let (client, tracker) = tracker_with(TrackerConfig::default());
    client.details.lock().unwrap().insert(
        "orders".to_string(),
        vec![partition(0, &[(1, 1000), (4, 250)])],
    );

    // nothing tracked yet
    tracker.refresh_cluster().await;
    assert!(client.detail_requests.lock().unwrap().is_empty());

    tracker.refresh_reassignments().await;
    tracker.refresh_cluster().await;
    assert_eq!(
        *client.detail_requests.lock().unwrap(),
        vec![vec!["orders".to_string()]]
    );
    assert!(client.cache.get("orders").await.is_some());

    tracker.refresh_reassignments().await;
    let orders = tracker
        .reassignment(ReassignmentId::for_topic("orders"))
        .await
        .unwrap();
    assert_eq!(orders.total_transfer_size, 1000);
    assert_eq!(orders.progress_percent, 25.0);
}

/// Cluster client whose first live-reassignment fetch blocks until released.
#[derive(Default)]
struct GatedClient {
    responses: std::sync::Mutex<VecDeque<Vec<LiveReassignment>>>,
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ClusterClient for GatedClient {
    async fn fetch_live_reassignments(
        &self,
        _force_refresh: bool,
    ) -> anyhow::Result<Vec<LiveReassignment>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().unwrap().pop_front().unwrap_or_default();
        self.entered.notify_one();
        if call == 0 {
            self.release.notified().await;
        }
        Ok(response)
    }

    async fn fetch_partition_details(
        &self,
        _topic_names: &[String],
        _force_refresh: bool,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

fn gated_tracker(responses: Vec<Vec<LiveReassignment>>) -> (Arc<GatedClient>, ProgressTracker) {
    let client = Arc::new(GatedClient::default());
    *client.responses.lock().unwrap() = responses.into();
    let tracker = ProgressTracker::new(client.clone(), PartitionCache::new(), TrackerConfig::default());
    (client, tracker)
}

/// **Test:** Stop With a Fetch in Flight
///
/// **Reason:** `stop()` can land while the periodic task waits on the cluster. The
/// result that arrives afterwards belongs to a stopped tracker.
///
/// **Expectation:** The late result is never applied, nothing panics, and the tracker can
/// still be refreshed on demand afterwards.
#[tokio::test]
async fn test_stop_discards_in_flight_fetch() {
    let (client, tracker) = gated_tracker(vec![
        vec![live("orders", 0, &[1, 4], &[4])],
        vec![live("payments", 0, &[2, 5], &[5])],
    ]);

    assert!(tracker.start());
    client.entered.notified().await;
    tracker.stop();
    client.release.notify_one();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tracker.reassignments().await.is_empty());

    tracker.refresh_reassignments().await;
    let tracked = tracker.reassignments().await;
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].topic, "payments");
}

/// **Test:** Overlapping Polls Apply in Fetch Order
///
/// **Reason:** An on-demand refresh can overlap the periodic poll. If the slower, older
/// fetch were applied last, a finished reassignment would come back to life.
///
/// **Expectation:** The second poll only fetches after the first one is applied, so the
/// newer empty live set wins and `orders` ends up completed.
#[tokio::test]
async fn test_overlapping_polls_apply_in_fetch_order() {
    let (client, tracker) = gated_tracker(vec![vec![live("orders", 0, &[1, 4], &[4])], vec![]]);
    let tracker = Arc::new(tracker);

    let first = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.refresh_reassignments().await }
    });
    client.entered.notified().await;

    let second = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.refresh_reassignments().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    client.release.notify_one();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    let orders = tracker
        .reassignment(ReassignmentId::for_topic("orders"))
        .await
        .unwrap();
    assert!(orders.is_completed());
}
