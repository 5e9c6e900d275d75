use anyhow::{anyhow, bail, Context, Result};
use replica_planner::{ClusterSnapshot, PartitionId, ReplicaPlannerConfig, TopicPartitions};
use std::fs::read_to_string;
use std::path::Path;
use tracing::{info, warn};

pub(crate) fn load_snapshot(path: &Path) -> Result<ClusterSnapshot> {
    let content = read_to_string(path)
        .with_context(|| format!("Failed to read cluster snapshot {}", path.display()))?;
    let snapshot: ClusterSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cluster snapshot {}", path.display()))?;
    info!(
        brokers = snapshot.brokers.len(),
        topics = snapshot.topics.len(),
        "cluster snapshot loaded"
    );
    Ok(snapshot)
}

/// Loads the YAML configuration file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ReplicaPlannerConfig> {
    let Some(path) = path else {
        return Ok(ReplicaPlannerConfig::default());
    };
    let content = read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// A `--select` argument: `topic` or `topic:p,p,..`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectionArg {
    pub(crate) topic: String,
    /// `None` selects every partition of the topic
    pub(crate) partitions: Option<Vec<PartitionId>>,
}

pub(crate) fn parse_selection(value: &str) -> Result<SelectionArg, String> {
    let (topic, partitions) = match value.split_once(':') {
        Some((topic, list)) => {
            let partitions = list
                .split(',')
                .map(|p| {
                    p.trim()
                        .parse::<PartitionId>()
                        .map_err(|e| format!("invalid partition id '{}': {}", p, e))
                })
                .collect::<Result<Vec<_>, _>>()?;
            (topic, Some(partitions))
        }
        None => (value, None),
    };
    if topic.is_empty() {
        return Err("topic name must not be empty".to_string());
    }
    Ok(SelectionArg {
        topic: topic.to_string(),
        partitions,
    })
}

/// Resolves the `--select` arguments against the snapshot.
pub(crate) fn resolve_selections(
    snapshot: &ClusterSnapshot,
    args: &[SelectionArg],
) -> Result<Vec<TopicPartitions>> {
    let mut selections = Vec::with_capacity(args.len());
    for arg in args {
        let selection = match &arg.partitions {
            Some(ids) => {
                let selection = TopicPartitions::select(snapshot, &arg.topic, ids);
                if let Some(found) = &selection {
                    if found.partitions.len() < ids.len() {
                        let missing: Vec<PartitionId> = ids
                            .iter()
                            .copied()
                            .filter(|id| !found.partitions.iter().any(|p| p.id == *id))
                            .collect();
                        warn!(topic = %arg.topic, partitions = ?missing, "ignoring unknown partitions");
                    }
                }
                selection
            }
            None => TopicPartitions::select_all(snapshot, &arg.topic),
        };
        selections.push(selection.ok_or_else(|| anyhow!("Unknown topic {}", arg.topic))?);
    }
    if selections.is_empty() {
        bail!("At least one --select is required");
    }
    Ok(selections)
}
