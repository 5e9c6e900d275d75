//! Bounded leader-swap optimisation over an assignment result.
//!
//! Each round walks every assigned partition and moves leadership to the replica
//! whose broker has the fewest planned leaders, when that strictly lowers the
//! partition's leader load. Ties keep the current leader. Rounds stop once the
//! cluster-wide leader skew is zero, stops improving, or the round bound is reached.
//!
//! A swap also moves `replica_size` of assigned size from the old leader to the new
//! one. Leadership does not change disk usage; this mirrors how existing plans were
//! tuned and is kept as a modelling approximation.

use serde::Serialize;
use tracing::debug;

use crate::broker_usage::UsageBook;
use crate::cluster::TopicAssignments;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceOutcome {
    /// Rounds that performed at least one evaluation pass
    pub rounds: usize,
    /// Leader swaps applied across all rounds
    pub switches: usize,
    /// Leader skew after the last round
    pub skew: i64,
}

pub fn balance_leaders(
    assignments: &mut TopicAssignments,
    usage: &mut UsageBook,
    max_rounds: usize,
) -> Result<BalanceOutcome> {
    let mut outcome = BalanceOutcome {
        skew: usage.leader_skew(),
        ..Default::default()
    };

    while outcome.rounds < max_rounds && outcome.skew > 0 {
        let switches = run_round(assignments, usage)?;
        let skew = usage.leader_skew();
        outcome.rounds += 1;
        outcome.switches += switches;

        debug!(
            round = outcome.rounds,
            switches,
            previous_skew = outcome.skew,
            skew,
            "leader balancing round finished"
        );

        let improved = skew < outcome.skew;
        outcome.skew = skew;
        if switches == 0 || !improved {
            break;
        }
    }

    Ok(outcome)
}

/// One pass over every partition, returns the number of swaps applied.
fn run_round(assignments: &mut TopicAssignments, usage: &mut UsageBook) -> Result<usize> {
    let mut switches = 0;

    for (topic_name, partitions) in assignments.iter_mut() {
        for (partition_id, assignment) in partitions.iter_mut() {
            if assignment.brokers.len() < 2 {
                continue;
            }
            let context = format!("replica of {}-{}", topic_name, partition_id);

            // the leader's count includes this partition, compare it without
            let leader_id = assignment.brokers[0].broker_id;
            let mut best_index = 0;
            let mut best_leaders = usage.require(leader_id, &context)?.planned_leaders() - 1;
            for (index, broker) in assignment.brokers.iter().enumerate().skip(1) {
                let leaders = usage.require(broker.broker_id, &context)?.planned_leaders();
                if leaders < best_leaders {
                    best_index = index;
                    best_leaders = leaders;
                }
            }
            if best_index == 0 {
                continue;
            }

            let new_leader_id = assignment.brokers[best_index].broker_id;
            let size = assignment.partition.replica_size as i64;

            let old_leader = usage.require_mut(leader_id, &context)?;
            old_leader.assigned.leaders -= 1;
            old_leader.assigned.size -= size;
            let new_leader = usage.require_mut(new_leader_id, &context)?;
            new_leader.assigned.leaders += 1;
            new_leader.assigned.size += size;

            assignment.brokers.swap(0, best_index);
            switches += 1;

            debug!(
                topic = %topic_name,
                partition = partition_id,
                from_broker = leader_id,
                to_broker = new_leader_id,
                "leader switched"
            );
        }
    }

    Ok(switches)
}
