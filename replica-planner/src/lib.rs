//! # Replica Planner
//!
//! Partition replica reassignment planning for a Kafka-style log-storage cluster.
//!
//! ## Core Responsibilities
//!
//! - **Usage Tracking**: Derives per-broker replica, leader and disk counters from a cluster snapshot
//! - **Replica Assignment**: Greedily places every replica of the selected partitions on target brokers
//! - **Leader Balancing**: Swaps leaders among the assigned replicas to minimise leader skew
//! - **Progress Tracking**: Polls live reassignments and estimates transfer speed and completion time
//!
//! ## Architecture
//!
//! The planner is a synchronous batch computation over an in-memory snapshot:
//! 1. Wrap every broker in a `BrokerUsage` record and compute actual/initial counters
//! 2. Run the assignment engine topic by topic, accumulating assigned counters
//! 3. Run bounded rounds of leader swaps over the result
//! 4. Return the `TopicAssignments` map
//!
//! The `ProgressTracker` is the only asynchronous component; it owns two periodic
//! refresh tasks and applies each poll result in a single synchronous step.

pub mod assignment;
pub mod broker_usage;
pub mod cluster;
pub mod config;
mod errors;
pub mod leader_balance;
pub mod planner_metrics;
pub mod progress;
mod planner;


// Re-export main types
pub use broker_usage::{BrokerUsage, UsageBook, UsageCounters};
pub use cluster::{
    Broker, BrokerId, ClusterSnapshot, LogDirEntry, Partition, PartitionAssignment, PartitionId,
    Topic, TopicAssignments, TopicPartitions,
};
pub use config::{PlannerConfig, ReplicaPlannerConfig, TrackerConfig};
pub use errors::{PlannerError, Result};
pub use planner::{plan_reassignment, PlanSummary, Planner, ReassignmentPlan};
pub use progress::{
    ClusterClient, LiveReassignment, PartitionCache, ProgressTracker, ReassignmentId,
    ReassignmentState,
};
