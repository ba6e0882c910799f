//! Agent state types, as persisted to `agents.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default heartbeat interval for a newly registered agent (seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;

/// Default heartbeat timeout for a newly registered agent (seconds).
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 300;

/// The lifecycle status of a tracked agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Working on a task.
    Active,
    /// Registered and alive, no current task.
    #[default]
    Idle,
    /// Marked dead by the sweep (or explicitly); recovers on heartbeat.
    Failed,
    /// Shut down; terminal for health purposes.
    Terminated,
}

impl AgentStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived health of an agent, in priority order: terminated and failed win
/// over staleness, staleness wins over healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    /// Agent is terminated.
    Terminated,
    /// Agent is marked failed.
    Failed,
    /// Heartbeat is older than the agent's timeout.
    Stale,
    /// Heartbeat is fresh.
    Healthy,
}

/// Resource counters reported by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    /// Model tokens consumed.
    pub tokens_used: u64,
    /// API calls made.
    pub api_calls: u64,
    /// CPU usage percentage, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    /// Resident memory in MB, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}

/// Partial resource update; `Some` fields overwrite, `None` fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsagePatch {
    /// New token count.
    pub tokens_used: Option<u64>,
    /// New API call count.
    pub api_calls: Option<u64>,
    /// New CPU percentage.
    pub cpu_percent: Option<f64>,
    /// New memory footprint in MB.
    pub memory_mb: Option<f64>,
}

/// The task an agent is currently working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTask {
    /// Task identifier.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// When the task was assigned.
    pub started_at: DateTime<Utc>,
}

/// Everything tracked about one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    /// Agent identifier.
    pub id: String,
    /// Role within the swarm (e.g. "researcher", "coder").
    pub role: String,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Most recent heartbeat.
    pub last_heartbeat: DateTime<Utc>,
    /// Expected heartbeat cadence in seconds.
    pub heartbeat_interval: u64,
    /// Seconds without a heartbeat before the agent counts as stale.
    pub heartbeat_timeout: u64,
    /// Tasks finished successfully.
    pub tasks_completed: u64,
    /// Tasks finished unsuccessfully.
    pub tasks_failed: u64,
    /// Task in progress, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<CurrentTask>,
    /// Reported resource counters.
    pub resource_usage: ResourceUsage,
}

impl AgentState {
    /// True if the most recent heartbeat is older than the timeout.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat > chrono::Duration::seconds(self.heartbeat_timeout as i64)
    }

    /// Derived health, evaluated in priority order.
    #[must_use]
    pub fn health(&self, now: DateTime<Utc>) -> AgentHealth {
        match self.status {
            AgentStatus::Terminated => AgentHealth::Terminated,
            AgentStatus::Failed => AgentHealth::Failed,
            _ if self.is_stale(now) => AgentHealth::Stale,
            _ => AgentHealth::Healthy,
        }
    }
}
