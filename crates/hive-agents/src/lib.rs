//! Agent heartbeat tracking for hivewatch.
//!
//! `hive-agents` keeps the liveness bookkeeping for the agents of a swarm:
//! registration, heartbeats, task assignment, resource counters, and the
//! staleness sweep that marks silent agents as failed. State is snapshotted
//! to `agents.json` after every mutation via [`hive_persist::JsonStore`].
//!
//! An agent is *stale* when its most recent heartbeat is older than its own
//! `heartbeat_timeout`. The periodic sweep only demotes stale **active**
//! agents; idle agents are left alone, and a later heartbeat recovers a
//! failed agent back to idle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracker;
pub mod types;

pub use tracker::{AgentHeartbeatTracker, StatusCounts};
pub use types::{
    AgentHealth, AgentState, AgentStatus, CurrentTask, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_HEARTBEAT_TIMEOUT_SECS, ResourceUsage, ResourceUsagePatch,
};
