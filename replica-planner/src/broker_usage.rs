//! Per-broker bookkeeping for one planning call.
//!
//! Every broker of the snapshot gets a `BrokerUsage` record holding a copy of the
//! broker plus four counter sets:
//! - **actual**: what the cluster hosts right now
//! - **selected**: the contribution of the partitions selected for reassignment
//! - **initial**: `actual - selected`, the cluster pretending the selection is gone
//! - **assigned**: what the current planning call has placed on the broker
//!
//! `planned = initial + assigned` is the projected end state that the assignment
//! engine and the leader balancer compare brokers on.

use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use crate::cluster::{Broker, BrokerId, ClusterSnapshot, Partition, TopicPartitions};
use crate::errors::{PlannerError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub replicas: i64,
    pub leaders: i64,
    pub size: i64,
}

impl UsageCounters {
    fn is_negative(&self) -> bool {
        self.replicas < 0 || self.leaders < 0 || self.size < 0
    }
}

impl Add for UsageCounters {
    type Output = UsageCounters;

    fn add(self, rhs: UsageCounters) -> UsageCounters {
        UsageCounters {
            replicas: self.replicas + rhs.replicas,
            leaders: self.leaders + rhs.leaders,
            size: self.size + rhs.size,
        }
    }
}

impl Sub for UsageCounters {
    type Output = UsageCounters;

    fn sub(self, rhs: UsageCounters) -> UsageCounters {
        UsageCounters {
            replicas: self.replicas - rhs.replicas,
            leaders: self.leaders - rhs.leaders,
            size: self.size - rhs.size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerUsage {
    pub broker: Broker,
    pub actual: UsageCounters,
    pub selected: UsageCounters,
    pub initial: UsageCounters,
    pub assigned: UsageCounters,
}

impl BrokerUsage {
    pub fn new(broker: Broker) -> Self {
        BrokerUsage {
            broker,
            actual: UsageCounters::default(),
            selected: UsageCounters::default(),
            initial: UsageCounters::default(),
            assigned: UsageCounters::default(),
        }
    }

    pub fn broker_id(&self) -> BrokerId {
        self.broker.broker_id
    }

    pub fn planned(&self) -> UsageCounters {
        self.initial + self.assigned
    }

    pub fn planned_replicas(&self) -> i64 {
        self.planned().replicas
    }

    pub fn planned_leaders(&self) -> i64 {
        self.planned().leaders
    }

    pub fn planned_size(&self) -> i64 {
        self.planned().size
    }

    /// Recomputes actual and initial counters and clears anything assigned so far.
    ///
    /// Fails when a topic of the snapshot has no partition data, which happens
    /// when the metadata fetch was incomplete or denied.
    pub fn recompute_stats(
        &mut self,
        snapshot: &ClusterSnapshot,
        selections: &[TopicPartitions],
    ) -> Result<()> {
        self.actual = self.count_actual(snapshot)?;
        self.selected = self.count_selected(selections);
        self.initial = self.actual - self.selected;
        self.assigned = UsageCounters::default();
        Ok(())
    }

    fn count_actual(&self, snapshot: &ClusterSnapshot) -> Result<UsageCounters> {
        let mut counters = UsageCounters::default();
        for topic in &snapshot.topics {
            let partitions = snapshot
                .partitions(&topic.topic_name)
                .ok_or_else(|| PlannerError::MissingPartitionData(topic.topic_name.clone()))?;

            for partition in partitions {
                if let Some(contribution) = self.contribution(partition, 0) {
                    counters = counters + contribution;
                }
            }
        }
        Ok(counters)
    }

    fn count_selected(&self, selections: &[TopicPartitions]) -> UsageCounters {
        let mut counters = UsageCounters::default();
        for selection in selections {
            for partition in &selection.partitions {
                // an offline broker has no log-dir entry, estimate with the replica size
                if let Some(contribution) = self.contribution(partition, partition.replica_size) {
                    counters = counters + contribution;
                }
            }
        }
        counters
    }

    /// What `partition` adds to this broker, `None` if the broker does not host it.
    fn contribution(&self, partition: &Partition, fallback_size: u64) -> Option<UsageCounters> {
        let broker_id = self.broker_id();
        if !partition.is_hosted_by(broker_id) {
            return None;
        }
        let size = partition.log_dir_size(broker_id).unwrap_or(fallback_size);
        Some(UsageCounters {
            replicas: 1,
            leaders: i64::from(partition.leader() == Some(broker_id)),
            size: size as i64,
        })
    }
}

/// Usage records of every broker, keyed by broker id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageBook {
    brokers: BTreeMap<BrokerId, BrokerUsage>,
}

impl UsageBook {
    pub fn new(brokers: &[Broker]) -> Self {
        let brokers = brokers
            .iter()
            .map(|b| (b.broker_id, BrokerUsage::new(b.clone())))
            .collect();
        UsageBook { brokers }
    }

    /// Virtually unassigns the whole selection on every broker.
    /// Must run before any assignment decision reads planned counters.
    pub fn recompute(
        &mut self,
        snapshot: &ClusterSnapshot,
        selections: &[TopicPartitions],
    ) -> Result<()> {
        for usage in self.brokers.values_mut() {
            usage.recompute_stats(snapshot, selections)?;
        }
        Ok(())
    }

    pub fn get(&self, broker_id: BrokerId) -> Option<&BrokerUsage> {
        self.brokers.get(&broker_id)
    }

    pub fn require(&self, broker_id: BrokerId, context: &str) -> Result<&BrokerUsage> {
        self.brokers
            .get(&broker_id)
            .ok_or_else(|| PlannerError::UnknownBroker {
                broker_id,
                context: context.to_string(),
            })
    }

    pub fn require_mut(&mut self, broker_id: BrokerId, context: &str) -> Result<&mut BrokerUsage> {
        self.brokers
            .get_mut(&broker_id)
            .ok_or_else(|| PlannerError::UnknownBroker {
                broker_id,
                context: context.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BrokerUsage> {
        self.brokers.values()
    }

    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }

    /// max - min of planned leaders across all brokers
    pub fn leader_skew(&self) -> i64 {
        let leaders = self.brokers.values().map(BrokerUsage::planned_leaders);
        let (min, max) = leaders.fold((i64::MAX, i64::MIN), |(min, max), l| {
            (min.min(l), max.max(l))
        });
        if self.brokers.is_empty() {
            0
        } else {
            max - min
        }
    }

    /// Brokers whose initial counters went negative, a sign of an inconsistent snapshot.
    pub fn negative_initial(&self) -> Vec<BrokerId> {
        self.brokers
            .values()
            .filter(|u| u.initial.is_negative())
            .map(BrokerUsage::broker_id)
            .collect()
    }
}
