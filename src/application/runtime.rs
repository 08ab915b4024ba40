//! Runtime composition root.
//!
//! One explicit value created at boot and threaded through everything:
//! registries, metrics, snapshots, lifecycle, the swarm table, and the
//! bridge command table. No module-level globals anywhere; each
//! sub-registry owns its lock.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::agent_loop::{enqueue_task, execute_direct};
use crate::application::health_monitor::HealthMonitor;
use crate::application::lifecycle::{AgentPatch, AgentRegistry, LifecycleManager};
use crate::application::swarm_manager::SwarmManager;
use crate::domain::models::{AgentConfig, AgentKind, AgentState, Config, SwarmConfig};
use crate::domain::ports::{
    LlmClient, MarketDataSource, SwarmBus, SyndicateError, SyndicateResult,
};
use crate::services::{
    handler, register_builtins, AbilityRegistry, CommandBus, CommandResult, MetricsStore,
    ParticleSwarm, SnapshotStore, TxLedger,
};

/// Everything the process holds at runtime.
pub struct SyndicateRuntime {
    pub config: Config,
    pub abilities: Arc<AbilityRegistry>,
    pub metrics: Arc<MetricsStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub commands: Arc<CommandBus>,
    pub tx_ledger: Arc<TxLedger>,
    pub bus: Arc<dyn SwarmBus>,
    pub llm: Arc<dyn LlmClient>,
    pub market: Arc<dyn MarketDataSource>,
    swarms: RwLock<HashMap<String, Arc<SwarmManager>>>,
    monitor: RwLock<Option<(Arc<HealthMonitor>, JoinHandle<()>)>>,
}

impl SyndicateRuntime {
    /// Wires the runtime from its configuration and the pluggable
    /// collaborators, registers built-in abilities and commands, and
    /// restores the snapshot if one exists.
    pub async fn bootstrap(
        config: Config,
        bus: Arc<dyn SwarmBus>,
        llm: Arc<dyn LlmClient>,
        market: Arc<dyn MarketDataSource>,
    ) -> SyndicateResult<Arc<Self>> {
        let abilities = Arc::new(AbilityRegistry::new());
        register_builtins(&abilities, Arc::clone(&llm)).await;

        let metrics = Arc::new(MetricsStore::new(
            config.metrics.enabled,
            config.metrics.ring_capacity(),
        ));
        let snapshots = Arc::new(SnapshotStore::new(&config.storage));
        let registry = Arc::new(AgentRegistry::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            registry,
            Arc::clone(&abilities),
            Arc::clone(&metrics),
            Arc::clone(&snapshots),
            config.agent.clone(),
            config.storage.auto_persist,
        ));

        let runtime = Arc::new(Self {
            config,
            abilities,
            metrics,
            snapshots,
            lifecycle,
            commands: Arc::new(CommandBus::new()),
            tx_ledger: Arc::new(TxLedger::new()),
            bus,
            llm,
            market,
            swarms: RwLock::new(HashMap::new()),
            monitor: RwLock::new(None),
        });

        // A corrupt snapshot must not abort boot; the registry stays empty
        if let Err(e) = runtime.lifecycle.load_snapshot().await {
            warn!(error = %e, "continuing with an empty registry");
        }

        runtime.register_commands().await;
        Ok(runtime)
    }

    /// Starts the background supervision if enabled.
    pub async fn start_monitor(self: &Arc<Self>) {
        if !self.config.agent.monitoring_enabled {
            return;
        }
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.metrics),
            self.config.agent.clone(),
        ));
        let handle = monitor.start();
        *self.monitor.write().await = Some((monitor, handle));
    }

    /// Registered swarm by id.
    pub async fn swarm(&self, id: &str) -> SyndicateResult<Arc<SwarmManager>> {
        self.swarms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SyndicateError::NotFound(format!("swarm {id}")))
    }

    /// Creates and registers a swarm manager.
    pub async fn create_swarm(self: &Arc<Self>, config: SwarmConfig) -> SyndicateResult<String> {
        let id = config.name.clone();
        let mut swarms = self.swarms.write().await;
        if swarms.contains_key(&id) {
            return Err(SyndicateError::InvalidTask(format!(
                "swarm {id} already exists"
            )));
        }
        let manager = Arc::new(SwarmManager::new(
            config,
            Box::new(ParticleSwarm::new()),
            Arc::clone(&self.market),
            Arc::clone(&self.bus),
            Arc::clone(&self.lifecycle),
            self.config.swarm.default_topic.clone(),
        ));
        swarms.insert(id.clone(), manager);
        info!(swarm_id = %id, "swarm created");
        Ok(id)
    }

    /// Cooperative shutdown: stop swarms and agents, stop the monitor,
    /// flush a final snapshot when auto-persist is on.
    pub async fn shutdown(&self) {
        info!("runtime shutting down");

        let swarms: Vec<Arc<SwarmManager>> = self.swarms.read().await.values().cloned().collect();
        for swarm in swarms {
            if let Err(e) = swarm.stop().await {
                warn!(error = %e, "swarm did not stop cleanly");
            }
        }

        for status in self.lifecycle.list(None, None).await {
            if !status.state.is_terminal() {
                if let Err(e) = self.lifecycle.stop(&status.id).await {
                    warn!(agent_id = %status.id, error = %e, "agent did not stop cleanly");
                }
            }
        }

        if let Some((monitor, handle)) = self.monitor.write().await.take() {
            monitor.shutdown();
            let _ = handle.await;
        }

        if self.config.storage.auto_persist {
            self.lifecycle.save_snapshot().await;
        }
        info!("runtime shut down");
    }

    /// Health probe payload served by the bridge transport.
    pub fn health_probe(&self) -> Value {
        let local_db = if self.snapshots.exists() {
            "connected"
        } else {
            "not found"
        };
        json!({
            "status": "ok",
            "storage": { "local_db": local_db },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        })
    }

    // ========================
    // Bridge command table
    // ========================

    #[allow(clippy::too_many_lines)]
    async fn register_commands(self: &Arc<Self>) {
        let commands = Arc::clone(&self.commands);

        // health / echo
        {
            let runtime = Arc::clone(self);
            commands
                .register("health", 0, handler(move |_| {
                    let runtime = Arc::clone(&runtime);
                    async move { CommandResult::ok(runtime.health_probe()) }
                }))
                .await;
        }
        commands
            .register("echo", 0, handler(|params| async move {
                CommandResult::ok(Value::Array(params))
            }))
            .await;

        // agent.*
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.create", 1, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let config: AgentConfig =
                            match serde_json::from_value(params[0].clone()) {
                                Ok(config) => config,
                                Err(e) => {
                                    return CommandResult::fail(format!("invalid agent config: {e}"))
                                }
                            };
                        match lifecycle.create(config).await {
                            Ok(id) => CommandResult::ok(json!({ "agent_id": id })),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.get", 1, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("agent id must be a string");
                        };
                        match lifecycle.status(id).await {
                            Ok(status) => CommandResult::ok(json!(status)),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.list", 0, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let kind = params
                            .first()
                            .and_then(Value::as_str)
                            .and_then(AgentKind::from_str);
                        let state = params
                            .get(1)
                            .and_then(Value::as_str)
                            .and_then(AgentState::from_str);
                        let agents = lifecycle.list(kind, state).await;
                        CommandResult::ok(json!(agents))
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.update", 2, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("agent id must be a string");
                        };
                        let patch = AgentPatch {
                            name: params[1]
                                .get("name")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            parameters: params[1]
                                .get("parameters")
                                .and_then(Value::as_object)
                                .cloned(),
                            state: params[1]
                                .get("state")
                                .and_then(Value::as_str)
                                .and_then(AgentState::from_str),
                        };
                        match lifecycle.update(id, patch).await {
                            Ok(status) => CommandResult::ok(json!(status)),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        for (name, op) in [
            ("agent.delete", 0_u8),
            ("agent.start", 1),
            ("agent.stop", 2),
            ("agent.pause", 3),
            ("agent.resume", 4),
        ] {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register(name, 1, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("agent id must be a string");
                        };
                        let result = match op {
                            0 => lifecycle.delete(id).await,
                            1 => lifecycle.start(id).await,
                            2 => lifecycle.stop(id).await,
                            3 => lifecycle.pause(id).await,
                            _ => lifecycle.resume(id).await,
                        };
                        match result {
                            Ok(()) => CommandResult::ok(json!({ "agent_id": id })),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            let abilities = Arc::clone(&self.abilities);
            commands
                .register("agent.execute", 2, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    let abilities = Arc::clone(&abilities);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("agent id must be a string");
                        };
                        let task = params[1].clone();
                        let agent = match lifecycle.get(id).await {
                            Ok(agent) => agent,
                            Err(e) => return CommandResult::fail(e.to_string()),
                        };
                        let queued = task
                            .get("queue")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        let result = if queued {
                            enqueue_task(&agent, task).await
                        } else {
                            execute_direct(&agent, &abilities, task).await
                        };
                        match result {
                            Ok(envelope) => CommandResult::ok(envelope),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }

        // agent.memory.*
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.memory.get", 2, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let (Some(id), Some(key)) = (params[0].as_str(), params[1].as_str())
                        else {
                            return CommandResult::fail("expected agent id and key");
                        };
                        match lifecycle.memory_get(id, key).await {
                            Ok(value) => {
                                CommandResult::ok(json!({ "key": key, "value": value }))
                            }
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.memory.set", 3, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let (Some(id), Some(key)) = (params[0].as_str(), params[1].as_str())
                        else {
                            return CommandResult::fail("expected agent id and key");
                        };
                        match lifecycle.memory_set(id, key, params[2].clone()).await {
                            Ok(()) => CommandResult::ok(json!({ "key": key })),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let lifecycle = Arc::clone(&self.lifecycle);
            commands
                .register("agent.memory.clear", 1, handler(move |params| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("agent id must be a string");
                        };
                        match lifecycle.memory_clear(id).await {
                            Ok(()) => CommandResult::ok(json!({ "agent_id": id })),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }

        // swarm.*
        {
            let runtime = Arc::clone(self);
            commands
                .register("swarm.create", 1, handler(move |params| {
                    let runtime = Arc::clone(&runtime);
                    async move {
                        let config: SwarmConfig = match serde_json::from_value(params[0].clone()) {
                            Ok(config) => config,
                            Err(e) => {
                                return CommandResult::fail(format!("invalid swarm config: {e}"))
                            }
                        };
                        match runtime.create_swarm(config).await {
                            Ok(id) => CommandResult::ok(json!({ "swarm_id": id })),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        for (name, op) in [("swarm.start", 0_u8), ("swarm.stop", 1)] {
            let runtime = Arc::clone(self);
            commands
                .register(name, 1, handler(move |params| {
                    let runtime = Arc::clone(&runtime);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("swarm id must be a string");
                        };
                        let manager = match runtime.swarm(id).await {
                            Ok(manager) => manager,
                            Err(e) => return CommandResult::fail(e.to_string()),
                        };
                        let result = if op == 0 {
                            manager.start().await
                        } else {
                            manager.stop().await
                        };
                        match result {
                            Ok(()) => CommandResult::ok(manager.status().await),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        for (name, adding) in [("swarm.add-agent", true), ("swarm.remove-agent", false)] {
            let runtime = Arc::clone(self);
            commands
                .register(name, 2, handler(move |params| {
                    let runtime = Arc::clone(&runtime);
                    async move {
                        let (Some(swarm_id), Some(agent_id)) =
                            (params[0].as_str(), params[1].as_str())
                        else {
                            return CommandResult::fail("expected swarm id and agent id");
                        };
                        let manager = match runtime.swarm(swarm_id).await {
                            Ok(manager) => manager,
                            Err(e) => return CommandResult::fail(e.to_string()),
                        };
                        let result = if adding {
                            manager.add_agent(agent_id).await
                        } else {
                            manager.remove_agent(agent_id).await
                        };
                        match result {
                            Ok(()) => CommandResult::ok(manager.status().await),
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }
        {
            let runtime = Arc::clone(self);
            commands
                .register("swarm.broadcast", 2, handler(move |params| {
                    let runtime = Arc::clone(&runtime);
                    async move {
                        let Some(swarm_id) = params[0].as_str() else {
                            return CommandResult::fail("swarm id must be a string");
                        };
                        let payload = params[1].clone();
                        let from = params
                            .get(2)
                            .and_then(Value::as_str)
                            .unwrap_or("bridge")
                            .to_string();
                        let manager = match runtime.swarm(swarm_id).await {
                            Ok(manager) => manager,
                            Err(e) => return CommandResult::fail(e.to_string()),
                        };
                        match manager.broadcast(&from, payload).await {
                            Ok(delivered) => {
                                CommandResult::ok(json!({ "delivered": delivered }))
                            }
                            Err(e) => CommandResult::fail(e.to_string()),
                        }
                    }
                }))
                .await;
        }

        // tx.*
        {
            let ledger = Arc::clone(&self.tx_ledger);
            commands
                .register("tx.submit-signed", 1, handler(move |params| {
                    let ledger = Arc::clone(&ledger);
                    async move {
                        let id = ledger.submit_signed(params[0].clone());
                        CommandResult::ok(json!({ "tx_id": id, "status": "submitted" }))
                    }
                }))
                .await;
        }
        {
            let ledger = Arc::clone(&self.tx_ledger);
            commands
                .register("tx.status", 1, handler(move |params| {
                    let ledger = Arc::clone(&ledger);
                    async move {
                        let Some(id) = params[0].as_str() else {
                            return CommandResult::fail("tx id must be a string");
                        };
                        match ledger.status(id) {
                            Some(record) => CommandResult::ok(json!(record)),
                            None => CommandResult::fail(format!("unknown transaction {id}")),
                        }
                    }
                }))
                .await;
        }
    }
}
