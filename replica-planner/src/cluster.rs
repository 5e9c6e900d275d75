//! Read-only cluster snapshot handed to the planner by the metadata client.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type BrokerId = i32;
pub type PartitionId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub broker_id: BrokerId,
    /// Failure-domain label, empty when the broker has no rack configured
    #[serde(default)]
    pub rack: String,
    #[serde(default)]
    pub address: String,
    /// Total capacity of the broker's log dirs, when reported
    #[serde(default)]
    pub disk_total_bytes: Option<u64>,
    /// Bytes used on the broker's log dirs, when reported
    #[serde(default)]
    pub disk_used_bytes: Option<u64>,
}

impl Broker {
    pub fn new(broker_id: BrokerId, rack: impl Into<String>) -> Self {
        Broker {
            broker_id,
            rack: rack.into(),
            address: String::new(),
            disk_total_bytes: None,
            disk_used_bytes: None,
        }
    }

    pub fn has_rack(&self) -> bool {
        !self.rack.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_name: String,
    pub replication_factor: i32,
    pub partition_count: i32,
}

/// Size reported by one broker's log dir for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDirEntry {
    pub size: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl LogDirEntry {
    pub fn ok(size: u64) -> Self {
        LogDirEntry { size, error: None }
    }

    pub fn is_available(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    /// Replica holders, the first one is the leader
    pub replicas: Vec<BrokerId>,
    /// Size of one replica in bytes, assumed uniform across replicas
    #[serde(default)]
    pub replica_size: u64,
    #[serde(default)]
    pub log_dir_sizes: BTreeMap<BrokerId, LogDirEntry>,
}

impl Partition {
    pub fn leader(&self) -> Option<BrokerId> {
        self.replicas.first().copied()
    }

    pub fn is_hosted_by(&self, broker_id: BrokerId) -> bool {
        self.replicas.contains(&broker_id)
    }

    /// Log-dir size reported by `broker_id`, ignoring entries flagged with an error.
    pub fn log_dir_size(&self, broker_id: BrokerId) -> Option<u64> {
        self.log_dir_sizes
            .get(&broker_id)
            .filter(|entry| entry.is_available())
            .map(|entry| entry.size)
    }

    /// Largest size reported by any healthy log dir for this partition.
    pub fn max_log_dir_size(&self) -> u64 {
        self.log_dir_sizes
            .values()
            .filter(|entry| entry.is_available())
            .map(|entry| entry.size)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub brokers: Vec<Broker>,
    pub topics: Vec<Topic>,
    /// Partition index keyed by topic name
    pub topic_partitions: BTreeMap<String, Vec<Partition>>,
}

impl ClusterSnapshot {
    pub fn broker(&self, broker_id: BrokerId) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.broker_id == broker_id)
    }

    pub fn topic(&self, topic_name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.topic_name == topic_name)
    }

    pub fn partitions(&self, topic_name: &str) -> Option<&[Partition]> {
        self.topic_partitions.get(topic_name).map(Vec::as_slice)
    }
}

/// A topic together with the subset of its partitions selected for reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicPartitions {
    pub topic: Topic,
    pub partitions: Vec<Partition>,
}

impl TopicPartitions {
    /// Selects the given partition ids of `topic_name` from the snapshot.
    /// Returns `None` when the topic or its partition data is unknown.
    pub fn select(
        snapshot: &ClusterSnapshot,
        topic_name: &str,
        partition_ids: &[PartitionId],
    ) -> Option<Self> {
        let topic = snapshot.topic(topic_name)?.clone();
        let all = snapshot.partitions(topic_name)?;
        let partitions = partition_ids
            .iter()
            .filter_map(|id| all.iter().find(|p| p.id == *id).cloned())
            .collect();
        Some(TopicPartitions { topic, partitions })
    }

    /// Selects every partition of `topic_name`.
    pub fn select_all(snapshot: &ClusterSnapshot, topic_name: &str) -> Option<Self> {
        let topic = snapshot.topic(topic_name)?.clone();
        let partitions = snapshot.partitions(topic_name)?.to_vec();
        Some(TopicPartitions { topic, partitions })
    }

    pub(crate) fn contains(&self, partition_id: PartitionId) -> bool {
        self.partitions.iter().any(|p| p.id == partition_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionAssignment {
    pub partition: Partition,
    /// New replica list, position 0 is the leader
    pub brokers: Vec<Broker>,
}

impl PartitionAssignment {
    pub fn broker_ids(&self) -> Vec<BrokerId> {
        self.brokers.iter().map(|b| b.broker_id).collect()
    }

    /// Brokers receiving a replica they do not host today.
    pub fn added_brokers(&self) -> BTreeSet<BrokerId> {
        self.brokers
            .iter()
            .map(|b| b.broker_id)
            .filter(|id| !self.partition.is_hosted_by(*id))
            .collect()
    }
}

/// topic name -> partition id -> assignment
pub type TopicAssignments = BTreeMap<String, BTreeMap<PartitionId, PartitionAssignment>>;
