use metrics::{describe_counter, describe_gauge};

pub struct Metric {
    pub name: &'static str,
    description: &'static str,
}

pub const COUNTERS: [Metric; 3] = [
    PLANNER_RUNS_TOTAL,
    PLANNER_LEADER_SWITCHES_TOTAL,
    TRACKER_FETCH_FAILURES_TOTAL,
];
pub const GAUGES: [Metric; 2] = [PLANNER_LEADER_SKEW, TRACKER_TRACKED_REASSIGNMENTS];

// PLANNER Metrics --------------------------

pub const PLANNER_RUNS_TOTAL: Metric = Metric {
    name: "replica_planner_runs_total",
    description: "Total number of reassignment planning calls (label result=ok|error)",
};

pub const PLANNER_LEADER_SWITCHES_TOTAL: Metric = Metric {
    name: "replica_planner_leader_switches_total",
    description: "Total number of leader swaps performed by the leader balancer",
};

pub const PLANNER_LEADER_SKEW: Metric = Metric {
    name: "replica_planner_leader_skew",
    description: "Max minus min planned leader count across brokers after the last plan",
};

// TRACKER Metrics --------------------------

pub const TRACKER_TRACKED_REASSIGNMENTS: Metric = Metric {
    name: "replica_planner_tracked_reassignments",
    description: "Number of reassignments currently tracked, completed ones included",
};

pub const TRACKER_FETCH_FAILURES_TOTAL: Metric = Metric {
    name: "replica_planner_tracker_fetch_failures_total",
    description: "Total number of failed collaborator calls while polling (label call)",
};

/// Registers metric descriptions with whatever recorder the host installed.
pub fn describe_metrics() {
    for metric in COUNTERS {
        describe_counter!(metric.name, metric.description);
    }
    for metric in GAUGES {
        describe_gauge!(metric.name, metric.description);
    }
}
