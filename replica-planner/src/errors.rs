use thiserror::Error;

use crate::cluster::BrokerId;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Cluster snapshot has no {0}")]
    EmptySnapshot(&'static str),

    #[error("Partition data is missing for topic {0}, check permissions or refresh the snapshot")]
    MissingPartitionData(String),

    #[error("No partitions selected for reassignment")]
    NoPartitionsSelected,

    #[error("At least {required} target brokers are required by the replication factor, {available} selected")]
    InsufficientTargetBrokers { required: usize, available: usize },

    #[error("Broker {broker_id} not found ({context})")]
    UnknownBroker { broker_id: BrokerId, context: String },

    #[error("Invalid replication factor {replication_factor} for topic {topic}")]
    InvalidReplicationFactor {
        topic: String,
        replication_factor: i32,
    },
}

impl PlannerError {
    /// Input errors are user-correctable; everything else means the snapshot is inconsistent.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PlannerError::EmptySnapshot(_)
                | PlannerError::NoPartitionsSelected
                | PlannerError::InsufficientTargetBrokers { .. }
        )
    }
}
