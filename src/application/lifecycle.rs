//! Agent lifecycle manager.
//!
//! All registry mutations go through one lock guarding both the agent
//! map and the loop-handle table. Lifecycle transitions bump `updated`
//! and, when auto-persist is on, flush a snapshot. Stopping is
//! cooperative: the manager flips the state and waits bounded for the
//! loop to observe it.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::agent_loop::{run_agent_loop, LoopContext};
use crate::domain::models::{
    Agent, AgentConfig, AgentKind, AgentState, AgentStatus, AgentTuning, LruMemory,
};
use crate::domain::ports::{SharedAgent, SyndicateError, SyndicateResult};
use crate::services::{AbilityRegistry, MetricsStore, PersistedAgent, SnapshotStore};

/// Extra slack on top of one idle sleep when waiting for a loop to
/// observe a stop signal.
const STOP_WAIT_SLACK_MS: u64 = 2_000;

struct RegistryInner {
    agents: HashMap<String, SharedAgent>,
    loops: HashMap<String, JoinHandle<()>>,
}

/// The agent registry: one lock over the agent map and the loop table.
pub struct AgentRegistry {
    inner: Mutex<RegistryInner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                agents: HashMap::new(),
                loops: HashMap::new(),
            }),
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields a caller may change after creation.
#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub name: Option<String>,
    /// Merged into the config parameter map, never replacing it
    pub parameters: Option<Map<String, Value>>,
    /// Honored with a warning; start/stop/pause/resume is the canonical path
    pub state: Option<AgentState>,
}

/// Per-loop liveness facts the health monitor reads in one registry pass.
#[derive(Debug, Clone)]
pub struct LoopProbe {
    pub agent_id: String,
    pub name: String,
    pub state: AgentState,
    pub updated: chrono::DateTime<chrono::Utc>,
    pub loop_finished: Option<bool>,
}

/// CRUD plus start/stop/pause/resume over the agent registry.
pub struct LifecycleManager {
    registry: Arc<AgentRegistry>,
    abilities: Arc<AbilityRegistry>,
    metrics: Arc<MetricsStore>,
    snapshots: Arc<SnapshotStore>,
    tuning: AgentTuning,
    auto_persist: bool,
}

impl LifecycleManager {
    pub fn new(
        registry: Arc<AgentRegistry>,
        abilities: Arc<AbilityRegistry>,
        metrics: Arc<MetricsStore>,
        snapshots: Arc<SnapshotStore>,
        tuning: AgentTuning,
        auto_persist: bool,
    ) -> Self {
        Self {
            registry,
            abilities,
            metrics,
            snapshots,
            tuning,
            auto_persist,
        }
    }

    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    // ========================
    // CRUD
    // ========================

    /// Instantiates an agent from its config and inserts it.
    pub async fn create(&self, config: AgentConfig) -> SyndicateResult<String> {
        let skills = self.abilities.resolve_skills(&config.abilities).await;
        let agent = Agent::new(config, skills);
        let id = agent.id.clone();

        {
            let mut inner = self.registry.inner.lock().await;
            inner
                .agents
                .insert(id.clone(), Arc::new(tokio::sync::RwLock::new(agent)));
        }
        info!(agent_id = %id, "agent created");

        self.persist_if_enabled().await;
        Ok(id)
    }

    /// Returns the shared handle for an agent.
    pub async fn get(&self, id: &str) -> SyndicateResult<SharedAgent> {
        let inner = self.registry.inner.lock().await;
        inner
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| SyndicateError::NotFound(format!("agent {id}")))
    }

    /// Status reports for all agents matching the optional filters.
    pub async fn list(
        &self,
        kind: Option<AgentKind>,
        state: Option<AgentState>,
    ) -> Vec<AgentStatus> {
        let agents: Vec<SharedAgent> = {
            let inner = self.registry.inner.lock().await;
            inner.agents.values().cloned().collect()
        };

        let mut out = Vec::new();
        for agent in agents {
            let agent = agent.read().await;
            if kind.is_some_and(|k| k != agent.kind) {
                continue;
            }
            if state.is_some_and(|s| s != agent.state) {
                continue;
            }
            out.push(agent.status());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Applies a patch. Direct state writes are honored with a warning.
    pub async fn update(&self, id: &str, patch: AgentPatch) -> SyndicateResult<AgentStatus> {
        let handle = self.get(id).await?;
        let status = {
            let mut agent = handle.write().await;
            if let Some(name) = patch.name {
                agent.name = name.clone();
                agent.config.name = name;
            }
            if let Some(parameters) = patch.parameters {
                for (key, value) in parameters {
                    agent.config.parameters.insert(key, value);
                }
            }
            if let Some(state) = patch.state {
                warn!(
                    agent_id = %id,
                    state = %state.as_str(),
                    "state patched directly; prefer start/stop/pause/resume"
                );
                agent.set_state(state);
            }
            agent.touch();
            agent.status()
        };

        self.persist_if_enabled().await;
        Ok(status)
    }

    /// Stops the agent if needed, then removes it from the registry.
    pub async fn delete(&self, id: &str) -> SyndicateResult<()> {
        // Idempotent stop; a never-started agent reconciles quietly
        self.stop(id).await?;

        let removed = {
            let mut inner = self.registry.inner.lock().await;
            inner.loops.remove(id);
            inner.agents.remove(id)
        };
        if removed.is_none() {
            return Err(SyndicateError::NotFound(format!("agent {id}")));
        }
        self.metrics.forget_agent(id);
        info!(agent_id = %id, "agent deleted");

        self.persist_if_enabled().await;
        Ok(())
    }

    // ========================
    // Lifecycle transitions
    // ========================

    /// Launches the agent's cooperative loop as a supervised task.
    pub async fn start(&self, id: &str) -> SyndicateResult<()> {
        let agent = {
            let mut inner = self.registry.inner.lock().await;
            let agent = inner
                .agents
                .get(id)
                .cloned()
                .ok_or_else(|| SyndicateError::NotFound(format!("agent {id}")))?;

            let state = agent.read().await.state;
            if let Some(handle) = inner.loops.get(id) {
                if !handle.is_finished() && state == AgentState::Running {
                    info!(agent_id = %id, "agent already running");
                    return Ok(());
                }
            }
            if state == AgentState::Paused {
                return Err(SyndicateError::illegal("start", "paused; resume instead"));
            }

            agent.write().await.set_state(AgentState::Initializing);

            let context = LoopContext {
                abilities: Arc::clone(&self.abilities),
                metrics: Arc::clone(&self.metrics),
                tuning: self.tuning.clone(),
            };
            let loop_agent = Arc::clone(&agent);
            let handle = tokio::spawn(async move {
                {
                    // A stop signal racing the launch must not be clobbered
                    let mut a = loop_agent.write().await;
                    if a.state == AgentState::Initializing {
                        a.set_state(AgentState::Running);
                    }
                }
                run_agent_loop(loop_agent, context).await;
            });
            inner.loops.insert(id.to_string(), handle);
            agent
        };

        let agent_name = agent.read().await.name.clone();
        info!(agent_id = %id, name = %agent_name, "agent started");
        self.persist_if_enabled().await;
        Ok(())
    }

    /// Signals the loop to stop and waits bounded for it to finish.
    pub async fn stop(&self, id: &str) -> SyndicateResult<()> {
        let (agent, handle) = {
            let mut inner = self.registry.inner.lock().await;
            let agent = inner
                .agents
                .get(id)
                .cloned()
                .ok_or_else(|| SyndicateError::NotFound(format!("agent {id}")))?;
            (agent, inner.loops.remove(id))
        };

        let handle = match handle {
            Some(h) if !h.is_finished() => h,
            other => {
                // No loop, or it already completed: reconcile the state
                if let Some(h) = other {
                    if let Err(e) = h.await {
                        warn!(agent_id = %id, error = ?e, "completed loop task had panicked");
                    }
                }
                let mut agent = agent.write().await;
                if agent.state != AgentState::Error {
                    agent.set_state(AgentState::Stopped);
                }
                self.persist_if_enabled().await;
                return Ok(());
            }
        };

        // Signal: the loop observes at most one iteration later
        agent.write().await.set_state(AgentState::Stopped);

        let budget =
            Duration::from_millis(self.tuning.default_sleep_ms.max(self.tuning.paused_sleep_ms))
                + Duration::from_millis(STOP_WAIT_SLACK_MS);

        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(())) => {
                info!(agent_id = %id, "agent stopped");
                self.persist_if_enabled().await;
                Ok(())
            }
            Ok(Err(join_err)) => {
                error!(agent_id = %id, error = ?join_err, "agent loop panicked");
                agent.write().await.set_state(AgentState::Error);
                self.persist_if_enabled().await;
                Ok(())
            }
            Err(_) => {
                error!(agent_id = %id, "timed out waiting for agent loop to stop");
                agent.write().await.set_state(AgentState::Error);
                self.persist_if_enabled().await;
                Err(SyndicateError::WaitTimeout(format!(
                    "agent {id} did not stop within {budget:?}"
                )))
            }
        }
    }

    /// Running → Paused. Any other state is an illegal transition and
    /// leaves the agent untouched.
    pub async fn pause(&self, id: &str) -> SyndicateResult<()> {
        let handle = self.get(id).await?;
        {
            let mut agent = handle.write().await;
            if agent.state != AgentState::Running {
                return Err(SyndicateError::illegal("pause", agent.state.as_str()));
            }
            agent.set_state(AgentState::Paused);
        }
        info!(agent_id = %id, "agent paused");
        self.persist_if_enabled().await;
        Ok(())
    }

    /// Paused → Running. Any other state is an illegal transition and
    /// leaves the agent untouched.
    pub async fn resume(&self, id: &str) -> SyndicateResult<()> {
        let handle = self.get(id).await?;
        {
            let mut agent = handle.write().await;
            if agent.state != AgentState::Paused {
                return Err(SyndicateError::illegal("resume", agent.state.as_str()));
            }
            agent.set_state(AgentState::Running);
        }
        info!(agent_id = %id, "agent resumed");
        self.persist_if_enabled().await;
        Ok(())
    }

    /// Point-in-time status report.
    pub async fn status(&self, id: &str) -> SyndicateResult<AgentStatus> {
        let handle = self.get(id).await?;
        let agent = handle.read().await;
        Ok(agent.status())
    }

    // ========================
    // Memory access for bridge handlers
    // ========================

    /// Reads a memory key, promoting it to most-recently-used.
    pub async fn memory_get(&self, id: &str, key: &str) -> SyndicateResult<Option<Value>> {
        let handle = self.get(id).await?;
        let mut agent = handle.write().await;
        Ok(agent.memory.get(key))
    }

    /// Writes a memory key.
    pub async fn memory_set(&self, id: &str, key: &str, value: Value) -> SyndicateResult<()> {
        let handle = self.get(id).await?;
        let mut agent = handle.write().await;
        agent.memory.set(key, value);
        Ok(())
    }

    /// Clears the agent's working memory.
    pub async fn memory_clear(&self, id: &str) -> SyndicateResult<()> {
        let handle = self.get(id).await?;
        let mut agent = handle.write().await;
        agent.memory.clear();
        Ok(())
    }

    // ========================
    // Health monitor support
    // ========================

    /// One-pass snapshot of loop liveness for every registered agent.
    /// Taken under the registry lock, read without it.
    pub async fn probe_loops(&self) -> Vec<LoopProbe> {
        let (agents, finished): (Vec<(String, SharedAgent)>, HashMap<String, bool>) = {
            let inner = self.registry.inner.lock().await;
            let agents = inner
                .agents
                .iter()
                .map(|(id, a)| (id.clone(), Arc::clone(a)))
                .collect();
            let finished = inner
                .loops
                .iter()
                .map(|(id, h)| (id.clone(), h.is_finished()))
                .collect();
            (agents, finished)
        };

        let mut probes = Vec::new();
        for (id, agent) in agents {
            let agent = agent.read().await;
            probes.push(LoopProbe {
                agent_id: id.clone(),
                name: agent.name.clone(),
                state: agent.state,
                updated: agent.updated,
                loop_finished: finished.get(&id).copied(),
            });
        }
        probes
    }

    // ========================
    // Persistence
    // ========================

    /// Captures every agent and writes the snapshot. Failures are
    /// logged, never raised.
    pub async fn save_snapshot(&self) {
        let agents: Vec<SharedAgent> = {
            let inner = self.registry.inner.lock().await;
            inner.agents.values().cloned().collect()
        };

        let mut persisted = Vec::with_capacity(agents.len());
        for agent in agents {
            let agent = agent.read().await;
            persisted.push(PersistedAgent::capture(&agent));
        }

        if let Err(e) = self.snapshots.save(&persisted) {
            error!(error = %e, "snapshot save failed");
        }
    }

    /// Loads the snapshot and rebuilds the registry.
    ///
    /// Agents are restored stopped, with empty history and queue, and a
    /// skill table rebuilt against the current registry (unknown skills
    /// dropped with a warning). A parse failure leaves the in-memory
    /// registry untouched.
    pub async fn load_snapshot(&self) -> SyndicateResult<usize> {
        let document = match self.snapshots.load() {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(0),
            Err(e) => {
                error!(error = %e, "snapshot load failed; registry left untouched");
                return Err(e);
            }
        };

        let mut restored: HashMap<String, SharedAgent> = HashMap::new();
        for (id, persisted) in document {
            let agent = self.restore_agent(persisted).await;
            restored.insert(id, Arc::new(tokio::sync::RwLock::new(agent)));
        }
        let count = restored.len();

        {
            let mut inner = self.registry.inner.lock().await;
            inner.agents = restored;
            inner.loops.clear();
        }
        info!(agents = count, "registry restored from snapshot");
        Ok(count)
    }

    async fn restore_agent(&self, persisted: PersistedAgent) -> Agent {
        let kind = AgentKind::from_code(persisted.kind).unwrap_or_else(|| {
            warn!(agent_id = %persisted.id, code = persisted.kind, "unknown agent kind code, defaulting");
            AgentKind::Custom
        });
        let persisted_skills = persisted.parsed_skills();

        let mut memory = LruMemory::new(persisted.config.memory.max_size);
        for (key, value) in persisted.memory {
            memory.set(key, value);
        }

        let mut skills = HashMap::new();
        for (name, entry) in persisted_skills {
            match self.abilities.get_skill(&name).await {
                Some(registered) => {
                    let mut state = crate::domain::models::SkillState::new(registered.skill);
                    state.xp = entry.xp;
                    state.last_exec = entry.last_exec;
                    skills.insert(name, state);
                }
                None => {
                    warn!(agent_id = %persisted.id, skill = %name, "persisted skill no longer registered, dropping");
                }
            }
        }

        Agent {
            id: persisted.id,
            name: persisted.name.clone(),
            kind,
            // Restart policy belongs to the lifecycle manager, not the
            // snapshot: everything comes back stopped
            state: AgentState::Stopped,
            created: persisted.created,
            updated: persisted.updated,
            config: persisted.config,
            memory,
            task_history: std::collections::VecDeque::new(),
            skills,
            queue: crate::domain::models::MessageQueue::new(),
            swarm_id: None,
            wakeup: Arc::new(tokio::sync::Notify::new()),
        }
    }

    async fn persist_if_enabled(&self) {
        if self.auto_persist {
            self.save_snapshot().await;
        }
    }
}
