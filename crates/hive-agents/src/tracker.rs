//! The heartbeat tracker and its periodic staleness sweep.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hive_persist::JsonStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{
    AgentHealth, AgentState, AgentStatus, CurrentTask, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_HEARTBEAT_TIMEOUT_SECS, ResourceUsage, ResourceUsagePatch,
};

/// Schema version written into `agents.json`.
const AGENTS_SCHEMA_VERSION: u32 = 1;

/// The persisted agent document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentsDocument {
    agents: HashMap<String, AgentState>,
    last_update: Option<DateTime<Utc>>,
    version: u32,
}

/// Agent counts per status, for the dashboard overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Agents currently active.
    pub active: usize,
    /// Agents currently idle.
    pub idle: usize,
    /// Agents marked failed.
    pub failed: usize,
    /// Agents terminated.
    pub terminated: usize,
}

/// Liveness bookkeeping for the agents of a swarm.
///
/// The tracker owns the id → [`AgentState`] map; every mutation goes through
/// its methods and snapshots the whole map to `agents.json`. Unknown agent
/// ids return `false`/`None` — never an error.
#[derive(Debug)]
pub struct AgentHeartbeatTracker {
    agents: RwLock<HashMap<String, AgentState>>,
    store: JsonStore,
    monitor_running: Arc<AtomicBool>,
}

impl AgentHeartbeatTracker {
    /// Creates a tracker, loading any persisted agents from
    /// `<state_dir>/agents.json`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "agents");
        let doc: AgentsDocument = store.load();
        debug!(count = doc.agents.len(), "loaded agents from disk");
        Self {
            agents: RwLock::new(doc.agents),
            store,
            monitor_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers an agent (or refreshes its role and intervals).
    ///
    /// New agents start `idle` with a fresh heartbeat. Re-registering keeps
    /// the existing task counters and heartbeat.
    pub fn register_agent(
        &self,
        id: impl Into<String>,
        role: impl Into<String>,
        heartbeat_interval: Option<Duration>,
        heartbeat_timeout: Option<Duration>,
    ) -> AgentState {
        let id = id.into();
        let role = role.into();
        let interval = heartbeat_interval.map_or(DEFAULT_HEARTBEAT_INTERVAL_SECS, |d| d.as_secs());
        let timeout = heartbeat_timeout.map_or(DEFAULT_HEARTBEAT_TIMEOUT_SECS, |d| d.as_secs());

        let mut agents = self.agents.write();
        let state = match agents.entry(id) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.role = role;
                existing.heartbeat_interval = interval;
                existing.heartbeat_timeout = timeout;
                existing.clone()
            }
            Entry::Vacant(entry) => {
                info!(agent = %entry.key(), role = %role, "registered agent");
                let state = AgentState {
                    id: entry.key().clone(),
                    role,
                    status: AgentStatus::Idle,
                    last_heartbeat: Utc::now(),
                    heartbeat_interval: interval,
                    heartbeat_timeout: timeout,
                    tasks_completed: 0,
                    tasks_failed: 0,
                    current_task: None,
                    resource_usage: ResourceUsage::default(),
                };
                entry.insert(state.clone());
                state
            }
        };
        self.snapshot(&agents);
        state
    }

    /// Records a heartbeat. A `failed` agent auto-recovers to `idle`.
    /// Returns `false` if the agent is unknown.
    pub fn heartbeat(&self, id: &str) -> bool {
        let mut agents = self.agents.write();
        let Some(agent) = agents.get_mut(id) else {
            return false;
        };

        agent.last_heartbeat = Utc::now();
        if agent.status == AgentStatus::Failed {
            info!(agent = %id, "agent recovered on heartbeat");
            agent.status = AgentStatus::Idle;
        }
        self.snapshot(&agents);
        true
    }

    /// Sets an agent's status directly. Returns `false` if unknown.
    pub fn set_agent_status(&self, id: &str, status: AgentStatus) -> bool {
        let mut agents = self.agents.write();
        let Some(agent) = agents.get_mut(id) else {
            return false;
        };
        agent.status = status;
        self.snapshot(&agents);
        true
    }

    /// Assigns a task: status becomes `active` and the task is recorded.
    /// Returns `false` if the agent is unknown.
    pub fn assign_task(&self, id: &str, task_id: &str, description: &str) -> bool {
        let mut agents = self.agents.write();
        let Some(agent) = agents.get_mut(id) else {
            return false;
        };
        agent.status = AgentStatus::Active;
        agent.current_task = Some(CurrentTask {
            id: task_id.to_string(),
            description: description.to_string(),
            started_at: Utc::now(),
        });
        self.snapshot(&agents);
        true
    }

    /// Completes the current task: bumps the success/failure counter, clears
    /// the task and returns the agent to `idle`. Returns `false` if unknown.
    pub fn complete_task(&self, id: &str, success: bool) -> bool {
        let mut agents = self.agents.write();
        let Some(agent) = agents.get_mut(id) else {
            return false;
        };
        if success {
            agent.tasks_completed += 1;
        } else {
            agent.tasks_failed += 1;
        }
        agent.current_task = None;
        agent.status = AgentStatus::Idle;
        self.snapshot(&agents);
        true
    }

    /// Merges the `Some` fields of `patch` into the agent's resource usage.
    /// Returns `false` if the agent is unknown.
    pub fn update_resource_usage(&self, id: &str, patch: &ResourceUsagePatch) -> bool {
        let mut agents = self.agents.write();
        let Some(agent) = agents.get_mut(id) else {
            return false;
        };
        if let Some(tokens) = patch.tokens_used {
            agent.resource_usage.tokens_used = tokens;
        }
        if let Some(calls) = patch.api_calls {
            agent.resource_usage.api_calls = calls;
        }
        if let Some(cpu) = patch.cpu_percent {
            agent.resource_usage.cpu_percent = Some(cpu);
        }
        if let Some(mem) = patch.memory_mb {
            agent.resource_usage.memory_mb = Some(mem);
        }
        self.snapshot(&agents);
        true
    }

    /// Returns a snapshot of one agent.
    #[must_use]
    pub fn get_agent(&self, id: &str) -> Option<AgentState> {
        self.agents.read().get(id).cloned()
    }

    /// Derived health of one agent.
    #[must_use]
    pub fn agent_health(&self, id: &str) -> Option<AgentHealth> {
        self.agents.read().get(id).map(|a| a.health(Utc::now()))
    }

    /// Snapshot of all agents, sorted by id.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentState> {
        let mut agents: Vec<AgentState> = self.agents.read().values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    /// Agents that are `active` but whose heartbeat has timed out, sorted by
    /// id. This is the list the `agent_stale` alert condition consumes.
    #[must_use]
    pub fn get_stale_agents(&self) -> Vec<AgentState> {
        let now = Utc::now();
        let mut stale: Vec<AgentState> = self
            .agents
            .read()
            .values()
            .filter(|a| a.status == AgentStatus::Active && a.is_stale(now))
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.id.cmp(&b.id));
        stale
    }

    /// Agent counts per status.
    #[must_use]
    pub fn counts_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for agent in self.agents.read().values() {
            match agent.status {
                AgentStatus::Active => counts.active += 1,
                AgentStatus::Idle => counts.idle += 1,
                AgentStatus::Failed => counts.failed += 1,
                AgentStatus::Terminated => counts.terminated += 1,
            }
        }
        counts
    }

    /// One sweep: marks every stale `active` agent as `failed` and returns
    /// the ids that were marked.
    pub fn sweep_stale(&self) -> Vec<String> {
        let now = Utc::now();
        let mut agents = self.agents.write();
        let mut marked = Vec::new();

        for agent in agents.values_mut() {
            if agent.status == AgentStatus::Active && agent.is_stale(now) {
                warn!(
                    agent = %agent.id,
                    last_heartbeat = %agent.last_heartbeat,
                    timeout_secs = agent.heartbeat_timeout,
                    "agent heartbeat timed out, marking failed"
                );
                agent.status = AgentStatus::Failed;
                marked.push(agent.id.clone());
            }
        }

        if !marked.is_empty() {
            marked.sort();
            self.snapshot(&agents);
        }
        marked
    }

    /// Starts the recurring staleness sweep.
    ///
    /// Returns `false` if a sweep is already running for this tracker; only
    /// one monitor may exist per tracker instance. The sweep interval is
    /// independent of per-agent timeouts, so a stale agent may go unmarked
    /// for up to one extra interval.
    pub fn start_heartbeat_monitor(self: &Arc<Self>, sweep_interval: Duration) -> bool {
        if self.monitor_running.swap(true, Ordering::SeqCst) {
            debug!("heartbeat monitor already running");
            return false;
        }

        info!(interval_ms = sweep_interval.as_millis() as u64, "heartbeat monitor started");
        let tracker = Arc::clone(self);
        let running = Arc::clone(&self.monitor_running);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let marked = tracker.sweep_stale();
                if !marked.is_empty() {
                    info!(count = marked.len(), agents = ?marked, "sweep marked agents failed");
                }
            }
            debug!("heartbeat monitor stopped");
        });

        true
    }

    /// Stops the recurring sweep. The task exits on its next tick.
    pub fn stop_heartbeat_monitor(&self) {
        if self.monitor_running.swap(false, Ordering::SeqCst) {
            info!("heartbeat monitor stopping");
        }
    }

    /// Whether the sweep task is running.
    #[must_use]
    pub fn monitor_running(&self) -> bool {
        self.monitor_running.load(Ordering::SeqCst)
    }

    fn snapshot(&self, agents: &HashMap<String, AgentState>) {
        let doc = AgentsDocument {
            agents: agents.clone(),
            last_update: Some(Utc::now()),
            version: AGENTS_SCHEMA_VERSION,
        };
        if let Err(e) = self.store.save(&doc) {
            warn!(error = %e, "failed to snapshot agent state");
        }
    }
}
