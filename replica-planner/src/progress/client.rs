use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::state::LiveReassignment;
use crate::cluster::Partition;

/// Read side of the cluster as seen by the progress tracker.
///
/// `fetch_partition_details` is expected to store its result in the [`PartitionCache`]
/// shared with the tracker. Both calls may fail; the tracker keeps its last state and
/// retries on the next tick.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn fetch_live_reassignments(
        &self,
        force_refresh: bool,
    ) -> anyhow::Result<Vec<LiveReassignment>>;

    async fn fetch_partition_details(
        &self,
        topic_names: &[String],
        force_refresh: bool,
    ) -> anyhow::Result<()>;
}

/// Partition details per topic, including per-broker log-dir sizes.
#[derive(Debug, Clone, Default)]
pub struct PartitionCache {
    inner: Arc<RwLock<HashMap<String, Vec<Partition>>>>,
}

impl PartitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, topic: &str, partitions: Vec<Partition>) {
        self.inner
            .write()
            .await
            .insert(topic.to_string(), partitions);
    }

    pub async fn get(&self, topic: &str) -> Option<Vec<Partition>> {
        self.inner.read().await.get(topic).cloned()
    }

    /// Copy of the cached details, so readers never hold the lock across a tick.
    pub(crate) async fn snapshot(&self) -> HashMap<String, Vec<Partition>> {
        self.inner.read().await.clone()
    }
}
