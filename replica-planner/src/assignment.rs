//! Greedy replica assignment for the selected partitions of one topic.
//!
//! ## Algorithm
//! Partitions are processed in selection order and replica slots in order, slot 0
//! becoming the leader. For every slot the free target brokers are ranked by:
//! 1. replicas of this topic already placed on the broker during this pass
//! 2. the broker already hosts the partition (no data transfer)
//! 3. the broker shares a rack with a current replica holder
//! 4. planned replica count across the whole cluster
//! 5. planned disk size
//! 6. broker id, ascending
//!
//! The winner is committed immediately and never revisited, so an early choice can
//! foreclose a cheaper placement for a later replica. This greedy trade-off is
//! accepted: the result is balanced but not traffic-optimal.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::broker_usage::UsageBook;
use crate::cluster::{Broker, BrokerId, Partition, PartitionAssignment, PartitionId, Topic};
use crate::errors::{PlannerError, Result};

/// Lower ranks win; field order is the tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CandidateRank {
    topic_replicas: usize,
    not_source_broker: bool,
    not_source_rack: bool,
    planned_replicas: i64,
    planned_size: i64,
    broker_id: BrokerId,
}

/// Picks `replication_factor` brokers out of `target_brokers` for every partition in
/// `partitions`, recording the placements in `usage`.
///
/// `all_brokers` resolves the current replica holders, which drive the locality and
/// rack preferences.
pub fn assign_topic(
    topic: &Topic,
    partitions: &[Partition],
    target_brokers: &[Broker],
    all_brokers: &[Broker],
    usage: &mut UsageBook,
) -> Result<BTreeMap<PartitionId, PartitionAssignment>> {
    if topic.replication_factor <= 0 {
        return Err(PlannerError::InvalidReplicationFactor {
            topic: topic.topic_name.clone(),
            replication_factor: topic.replication_factor,
        });
    }
    let replication_factor = topic.replication_factor as usize;

    let mut assignments = BTreeMap::new();
    // replicas of this topic placed per broker during this pass
    let mut topic_replicas: HashMap<BrokerId, usize> = HashMap::new();

    for partition in partitions {
        let source_brokers = resolve_source_brokers(topic, partition, all_brokers)?;
        let source_racks: BTreeSet<&str> = source_brokers
            .iter()
            .filter(|b| b.has_rack())
            .map(|b| b.rack.as_str())
            .collect();

        let mut chosen: Vec<Broker> = Vec::with_capacity(replication_factor);
        for slot in 0..replication_factor {
            let mut best: Option<(CandidateRank, &Broker)> = None;

            for candidate in target_brokers
                .iter()
                .filter(|b| !chosen.iter().any(|c| c.broker_id == b.broker_id))
            {
                let planned = usage.require(candidate.broker_id, "target broker")?;
                let rank = CandidateRank {
                    topic_replicas: topic_replicas
                        .get(&candidate.broker_id)
                        .copied()
                        .unwrap_or(0),
                    not_source_broker: !partition.is_hosted_by(candidate.broker_id),
                    not_source_rack: !(candidate.has_rack()
                        && source_racks.contains(candidate.rack.as_str())),
                    planned_replicas: planned.planned_replicas(),
                    planned_size: planned.planned_size(),
                    broker_id: candidate.broker_id,
                };
                if best.as_ref().map_or(true, |(current, _)| rank < *current) {
                    best = Some((rank, candidate));
                }
            }

            let (rank, winner) = best.ok_or(PlannerError::InsufficientTargetBrokers {
                required: replication_factor,
                available: target_brokers.len(),
            })?;

            *topic_replicas.entry(winner.broker_id).or_insert(0) += 1;
            let winner_usage = usage.require_mut(winner.broker_id, "target broker")?;
            winner_usage.assigned.replicas += 1;
            winner_usage.assigned.size += partition.replica_size as i64;
            if slot == 0 {
                winner_usage.assigned.leaders += 1;
            }

            debug!(
                topic = %topic.topic_name,
                partition = partition.id,
                slot,
                broker_id = winner.broker_id,
                stays_local = !rank.not_source_broker,
                same_rack = !rank.not_source_rack,
                "replica placed"
            );
            chosen.push(winner.clone());
        }

        assignments.insert(
            partition.id,
            PartitionAssignment {
                partition: partition.clone(),
                brokers: chosen,
            },
        );
    }

    Ok(assignments)
}

fn resolve_source_brokers<'a>(
    topic: &Topic,
    partition: &Partition,
    all_brokers: &'a [Broker],
) -> Result<Vec<&'a Broker>> {
    partition
        .replicas
        .iter()
        .map(|id| {
            all_brokers
                .iter()
                .find(|b| b.broker_id == *id)
                .ok_or_else(|| PlannerError::UnknownBroker {
                    broker_id: *id,
                    context: format!(
                        "current replica of {}-{}",
                        topic.topic_name, partition.id
                    ),
                })
        })
        .collect()
}
