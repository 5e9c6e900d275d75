use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use replica_planner::{Broker, BrokerId, ClusterSnapshot, PartitionId, Planner, ReassignmentPlan};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::snapshot::{load_config, load_snapshot, parse_selection, resolve_selections, SelectionArg};

#[derive(Debug, Args)]
pub(crate) struct Plan {
    #[arg(long, help = "Cluster snapshot JSON file")]
    snapshot: PathBuf,
    #[arg(
        long,
        required = true,
        value_parser = parse_selection,
        help = "Partitions to reassign, topic or topic:p,p,.. (repeatable)"
    )]
    select: Vec<SelectionArg>,
    #[arg(long, required = true, value_delimiter = ',', help = "Target broker ids, comma separated")]
    targets: Vec<BrokerId>,
    #[arg(long, help = "Planner configuration YAML file")]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PlannedPartition<'a> {
    topic: &'a str,
    partition: PartitionId,
    replicas: Vec<BrokerId>,
}

pub(crate) fn handle_command(plan: Plan) -> Result<()> {
    let snapshot = load_snapshot(&plan.snapshot)?;
    let config = load_config(plan.config.as_deref())?;
    let selections = resolve_selections(&snapshot, &plan.select)?;
    let targets = target_brokers(&snapshot, &plan.targets)?;

    let result = match Planner::new(config.planner).plan(&snapshot, &selections, &targets) {
        Ok(result) => result,
        Err(e) if e.is_input_error() => bail!("Invalid planning request: {}", e),
        Err(e) => {
            return Err(e).context("Failed to compute the reassignment plan, the snapshot looks inconsistent")
        }
    };

    let summary = result.summary();
    info!(
        partitions = summary.partitions,
        moved_replicas = summary.moved_replicas,
        transfer_bytes = summary.transfer_bytes,
        leader_changes = summary.leader_changes,
        leader_switches = summary.leader_switches,
        leader_skew = summary.leader_skew,
        "plan summary"
    );

    println!("{}", serde_json::to_string_pretty(&planned_partitions(&result))?);
    Ok(())
}

fn target_brokers(snapshot: &ClusterSnapshot, ids: &[BrokerId]) -> Result<Vec<Broker>> {
    ids.iter()
        .map(|id| {
            snapshot
                .broker(*id)
                .cloned()
                .ok_or_else(|| anyhow!("Target broker {} is not in the snapshot", id))
        })
        .collect()
}

fn planned_partitions(plan: &ReassignmentPlan) -> Vec<PlannedPartition<'_>> {
    plan.assignments
        .iter()
        .flat_map(|(topic, partitions)| {
            partitions.iter().map(move |(id, assignment)| PlannedPartition {
                topic,
                partition: *id,
                replicas: assignment.broker_ids(),
            })
        })
        .collect()
}
