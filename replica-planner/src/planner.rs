use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::assignment::assign_topic;
use crate::broker_usage::UsageBook;
use crate::cluster::{Broker, BrokerId, ClusterSnapshot, TopicAssignments, TopicPartitions};
use crate::config::PlannerConfig;
use crate::errors::{PlannerError, Result};
use crate::leader_balance::{balance_leaders, BalanceOutcome};
use crate::planner_metrics::{
    PLANNER_LEADER_SKEW, PLANNER_LEADER_SWITCHES_TOTAL, PLANNER_RUNS_TOTAL,
};

/// Result of one planning call.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignmentPlan {
    pub assignments: TopicAssignments,
    /// Final per-broker counters, planned = initial + assigned
    pub usage: UsageBook,
    pub leader_balance: BalanceOutcome,
}

/// Cost of a plan compared to the current placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub partitions: usize,
    /// Replicas landing on a broker that does not host the partition today
    pub moved_replicas: usize,
    /// Estimated bytes copied over the network for the moved replicas
    pub transfer_bytes: u64,
    /// Partitions whose leader differs from the current one
    pub leader_changes: usize,
    pub leader_switches: usize,
    pub leader_skew: i64,
}

impl ReassignmentPlan {
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            leader_switches: self.leader_balance.switches,
            leader_skew: self.leader_balance.skew,
            ..Default::default()
        };
        for assignment in self.assignments.values().flat_map(|p| p.values()) {
            let added = assignment.added_brokers().len();
            summary.partitions += 1;
            summary.moved_replicas += added;
            summary.transfer_bytes += added as u64 * assignment.partition.replica_size;
            let new_leader = assignment.brokers.first().map(|b| b.broker_id);
            if new_leader != assignment.partition.leader() {
                summary.leader_changes += 1;
            }
        }
        summary
    }
}

/// Entry point of the reassignment planner.
///
/// Planning is a synchronous batch computation over an owned copy of the usage
/// counters; nothing outside the returned plan is mutated.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Planner { config }
    }

    /// Computes new replica lists for every selected partition.
    ///
    /// ## Validation (before any computation):
    /// - the snapshot has brokers, topics and a partition index
    /// - every selected topic has partition data
    /// - at least one partition is selected
    /// - there are at least as many target brokers as the largest replication factor
    ///
    /// ## Procedure:
    /// 1. Compute actual and initial counters for every broker
    /// 2. Assign replicas topic by topic
    /// 3. Run bounded leader balancing rounds
    pub fn plan(
        &self,
        snapshot: &ClusterSnapshot,
        selections: &[TopicPartitions],
        target_brokers: &[Broker],
    ) -> Result<ReassignmentPlan> {
        let result = self.plan_inner(snapshot, selections, target_brokers);
        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(PLANNER_RUNS_TOTAL.name, "result" => outcome).increment(1);
        result
    }

    fn plan_inner(
        &self,
        snapshot: &ClusterSnapshot,
        selections: &[TopicPartitions],
        target_brokers: &[Broker],
    ) -> Result<ReassignmentPlan> {
        let selections = merge_selections(selections);
        let targets = validate(snapshot, &selections, target_brokers)?;

        let mut usage = UsageBook::new(&snapshot.brokers);
        usage.recompute(snapshot, &selections)?;

        let negative = usage.negative_initial();
        if !negative.is_empty() {
            warn!(
                brokers = ?negative,
                "initial broker usage went negative, the cluster snapshot looks inconsistent"
            );
        }

        let mut assignments = TopicAssignments::new();
        for selection in &selections {
            let topic = &selection.topic;
            if topic.replication_factor <= 0 {
                warn!(
                    topic = %topic.topic_name,
                    replication_factor = topic.replication_factor,
                    "skipping topic with invalid replication factor"
                );
                continue;
            }
            if selection.partitions.is_empty() {
                continue;
            }

            let placed = assign_topic(
                topic,
                &selection.partitions,
                &targets,
                &snapshot.brokers,
                &mut usage,
            )?;
            debug!(
                topic = %topic.topic_name,
                partitions = placed.len(),
                "topic replicas assigned"
            );
            assignments
                .entry(topic.topic_name.clone())
                .or_default()
                .extend(placed);
        }

        let leader_balance =
            balance_leaders(&mut assignments, &mut usage, self.config.max_leader_rounds)?;

        counter!(PLANNER_LEADER_SWITCHES_TOTAL.name).increment(leader_balance.switches as u64);
        gauge!(PLANNER_LEADER_SKEW.name).set(leader_balance.skew as f64);

        info!(
            topics = assignments.len(),
            target_brokers = targets.len(),
            leader_rounds = leader_balance.rounds,
            leader_switches = leader_balance.switches,
            leader_skew = leader_balance.skew,
            "reassignment plan computed"
        );

        Ok(ReassignmentPlan {
            assignments,
            usage,
            leader_balance,
        })
    }
}

/// Plans a reassignment with the default configuration and returns only the assignments.
pub fn plan_reassignment(
    snapshot: &ClusterSnapshot,
    selections: &[TopicPartitions],
    target_brokers: &[Broker],
) -> Result<TopicAssignments> {
    Planner::default()
        .plan(snapshot, selections, target_brokers)
        .map(|plan| plan.assignments)
}

/// Folds repeated selections of one topic together, keeping the first occurrence order.
fn merge_selections(selections: &[TopicPartitions]) -> Vec<TopicPartitions> {
    let mut merged: Vec<TopicPartitions> = Vec::with_capacity(selections.len());
    for selection in selections {
        match merged
            .iter_mut()
            .find(|m| m.topic.topic_name == selection.topic.topic_name)
        {
            Some(existing) => {
                for partition in &selection.partitions {
                    if !existing.contains(partition.id) {
                        existing.partitions.push(partition.clone());
                    }
                }
            }
            None => merged.push(selection.clone()),
        }
    }
    merged
}

/// Fails fast on unusable input and returns the de-duplicated target brokers.
fn validate(
    snapshot: &ClusterSnapshot,
    selections: &[TopicPartitions],
    target_brokers: &[Broker],
) -> Result<Vec<Broker>> {
    if snapshot.brokers.is_empty() {
        return Err(PlannerError::EmptySnapshot("brokers"));
    }
    if snapshot.topics.is_empty() {
        return Err(PlannerError::EmptySnapshot("topics"));
    }
    if snapshot.topic_partitions.is_empty() {
        return Err(PlannerError::EmptySnapshot("partition index"));
    }

    for selection in selections {
        if snapshot.partitions(&selection.topic.topic_name).is_none() {
            return Err(PlannerError::MissingPartitionData(
                selection.topic.topic_name.clone(),
            ));
        }
    }

    if selections.iter().all(|s| s.partitions.is_empty()) {
        return Err(PlannerError::NoPartitionsSelected);
    }

    let mut seen: BTreeSet<BrokerId> = BTreeSet::new();
    let mut targets = Vec::with_capacity(target_brokers.len());
    for broker in target_brokers {
        if !seen.insert(broker.broker_id) {
            warn!(broker_id = broker.broker_id, "ignoring duplicate target broker");
            continue;
        }
        if snapshot.broker(broker.broker_id).is_none() {
            return Err(PlannerError::UnknownBroker {
                broker_id: broker.broker_id,
                context: "target broker".to_string(),
            });
        }
        targets.push(broker.clone());
    }

    let required = selections
        .iter()
        .filter(|s| !s.partitions.is_empty())
        .map(|s| s.topic.replication_factor.max(0) as usize)
        .max()
        .unwrap_or(0);
    if targets.len() < required {
        return Err(PlannerError::InsufficientTargetBrokers {
            required,
            available: targets.len(),
        });
    }

    Ok(targets)
}
