use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::cluster::{BrokerId, Partition, PartitionId};

/// Stable identity of a tracked reassignment, derived from the topic name only so that
/// partitions of one topic reported separately are tracked as a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReassignmentId(u64);

impl ReassignmentId {
    pub fn for_topic(topic: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        topic.hash(&mut hasher);
        ReassignmentId(hasher.finish())
    }
}

/// One in-flight partition reassignment as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveReassignment {
    pub topic: String,
    pub partition: PartitionId,
    pub replicas: Vec<BrokerId>,
    #[serde(default)]
    pub adding_replicas: Vec<BrokerId>,
    #[serde(default)]
    pub removing_replicas: Vec<BrokerId>,
}

impl LiveReassignment {
    pub fn id(&self) -> ReassignmentId {
        ReassignmentId::for_topic(&self.topic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionProgress {
    pub partition: PartitionId,
    pub replicas: Vec<BrokerId>,
    pub adding_replicas: Vec<BrokerId>,
    pub removing_replicas: Vec<BrokerId>,
    /// Largest size reported by a healthy log dir of this partition
    pub max_replica_size: u64,
    /// Bytes already present on each adding replica
    pub current_size: BTreeMap<BrokerId, u64>,
}

impl PartitionProgress {
    fn new(live: &LiveReassignment) -> Self {
        PartitionProgress {
            partition: live.partition,
            replicas: live.replicas.clone(),
            adding_replicas: live.adding_replicas.clone(),
            removing_replicas: live.removing_replicas.clone(),
            max_replica_size: 0,
            current_size: BTreeMap::new(),
        }
    }

    fn transfer_size(&self) -> u64 {
        self.max_replica_size * self.adding_replicas.len() as u64
    }

    fn transferred(&self) -> u64 {
        self.current_size.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RemainingSample {
    pub bytes: u64,
    pub at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReassignmentState {
    pub id: ReassignmentId,
    pub topic: String,
    pub partitions: BTreeMap<PartitionId, PartitionProgress>,
    pub total_transfer_size: u64,
    pub remaining: Option<RemainingSample>,
    pub remaining_prev: Option<RemainingSample>,
    pub progress_percent: f64,
    /// Bytes per second, negative while the leader still grows faster than the copy
    pub estimate_speed: Option<f64>,
    pub estimate_completion_time: Option<SystemTime>,
    pub actual_time_completed: Option<SystemTime>,
}

impl ReassignmentState {
    pub fn new(topic: &str) -> Self {
        ReassignmentState {
            id: ReassignmentId::for_topic(topic),
            topic: topic.to_string(),
            partitions: BTreeMap::new(),
            total_transfer_size: 0,
            remaining: None,
            remaining_prev: None,
            progress_percent: 0.0,
            estimate_speed: None,
            estimate_completion_time: None,
            actual_time_completed: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.actual_time_completed.is_some()
    }

    /// Records the latest replica lists reported for one partition.
    /// Partitions that finished earlier are kept.
    fn merge_live(&mut self, live: &LiveReassignment) {
        self.partitions
            .entry(live.partition)
            .and_modify(|p| {
                p.replicas = live.replicas.clone();
                p.adding_replicas = live.adding_replicas.clone();
                p.removing_replicas = live.removing_replicas.clone();
            })
            .or_insert_with(|| PartitionProgress::new(live));
    }

    /// Recomputes sizes, remaining bytes, speed and ETA from the partition details.
    fn recompute(&mut self, details: Option<&[Partition]>, now: SystemTime) {
        for progress in self.partitions.values_mut() {
            let detail = details.and_then(|d| d.iter().find(|p| p.id == progress.partition));
            if let Some(detail) = detail {
                progress.max_replica_size = detail.max_log_dir_size();
            }
            progress.current_size = progress
                .adding_replicas
                .iter()
                .map(|b| (*b, detail.and_then(|d| d.log_dir_size(*b)).unwrap_or(0)))
                .collect();
        }

        self.total_transfer_size = self.partitions.values().map(PartitionProgress::transfer_size).sum();
        let transferred: u64 = self.partitions.values().map(PartitionProgress::transferred).sum();
        let remaining = self.total_transfer_size.saturating_sub(transferred);

        // a new sample only when the value moved, so speed never divides by zero time
        if self.remaining.map(|r| r.bytes) != Some(remaining) {
            self.remaining_prev = self.remaining.take();
            self.remaining = Some(RemainingSample {
                bytes: remaining,
                at: now,
            });
        }

        self.progress_percent = if self.total_transfer_size > 0 {
            transferred.min(self.total_transfer_size) as f64 * 100.0
                / self.total_transfer_size as f64
        } else {
            0.0
        };

        if let (Some(current), Some(previous)) = (self.remaining, self.remaining_prev) {
            let elapsed = current
                .at
                .duration_since(previous.at)
                .unwrap_or_default()
                .as_secs_f64();
            if elapsed > 0.0 {
                self.estimate_speed =
                    Some((previous.bytes as f64 - current.bytes as f64) / elapsed);
            }
        }

        self.estimate_completion_time = match (self.estimate_speed, self.remaining) {
            // a stalled transfer that moves a few bytes yields an ETA past what
            // Duration or SystemTime can hold, leave it unset then
            (Some(speed), Some(current)) if speed > 0.0 => {
                Duration::try_from_secs_f64(current.bytes as f64 / speed)
                    .ok()
                    .and_then(|eta| now.checked_add(eta))
            }
            _ => None,
        };
    }

    fn mark_completed(&mut self, now: SystemTime) {
        self.actual_time_completed = Some(now);
        self.progress_percent = 100.0;
        self.estimate_completion_time = None;
    }
}

/// Every reassignment the tracker knows about, live or recently completed.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReassignmentBook {
    states: BTreeMap<ReassignmentId, ReassignmentState>,
}

impl ReassignmentBook {
    /// Applies one poll result. All mutations happen here, in one synchronous step.
    pub(crate) fn apply_tick(
        &mut self,
        live: &[LiveReassignment],
        details: &HashMap<String, Vec<Partition>>,
        now: SystemTime,
        completed_grace: Duration,
    ) {
        let mut live_by_id: BTreeMap<ReassignmentId, Vec<&LiveReassignment>> = BTreeMap::new();
        for entry in live {
            live_by_id.entry(entry.id()).or_default().push(entry);
        }

        for (id, entries) in &live_by_id {
            let topic = &entries[0].topic;
            let state = self.states.entry(*id).or_insert_with(|| {
                info!(topic = %topic, "tracking new reassignment");
                ReassignmentState::new(topic)
            });
            if state.is_completed() {
                info!(topic = %topic, "completed reassignment is live again");
                state.actual_time_completed = None;
            }
            for entry in entries {
                state.merge_live(entry);
            }
            state.recompute(details.get(topic.as_str()).map(Vec::as_slice), now);
            debug!(
                topic = %topic,
                progress_percent = state.progress_percent,
                remaining = ?state.remaining.map(|r| r.bytes),
                speed = ?state.estimate_speed,
                "reassignment progress updated"
            );
        }

        for state in self.states.values_mut() {
            if !state.is_completed() && !live_by_id.contains_key(&state.id) {
                info!(topic = %state.topic, "reassignment completed");
                state.mark_completed(now);
            }
        }

        self.states.retain(|_, state| match state.actual_time_completed {
            Some(completed) => now
                .duration_since(completed)
                .map_or(true, |elapsed| elapsed <= completed_grace),
            None => true,
        });
    }

    /// Topics of the reassignments that are still running.
    pub(crate) fn live_topics(&self) -> Vec<String> {
        self.states
            .values()
            .filter(|s| !s.is_completed())
            .map(|s| s.topic.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub(crate) fn get(&self, id: ReassignmentId) -> Option<&ReassignmentState> {
        self.states.get(&id)
    }

    pub(crate) fn states(&self) -> impl Iterator<Item = &ReassignmentState> {
        self.states.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }
}
