use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Replica planner configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Upper bound on leader-swap rounds per planning call
    pub max_leader_rounds: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_leader_rounds: 10,
        }
    }
}

/// Reassignment progress tracker configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// How often live reassignments are polled (seconds)
    pub reassignment_refresh_seconds: u64,
    /// How often partition log-dir details are refreshed (seconds)
    pub cluster_refresh_seconds: u64,
    /// How long a completed reassignment stays visible (seconds)
    pub completed_grace_seconds: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reassignment_refresh_seconds: 4,
            cluster_refresh_seconds: 6,
            completed_grace_seconds: 10,
        }
    }
}

impl TrackerConfig {
    pub fn reassignment_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.reassignment_refresh_seconds.max(1))
    }

    pub fn cluster_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cluster_refresh_seconds.max(1))
    }

    pub fn completed_grace(&self) -> Duration {
        Duration::from_secs(self.completed_grace_seconds)
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReplicaPlannerConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}
