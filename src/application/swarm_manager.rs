//! Swarm manager.
//!
//! Binds a swarm to an optimizer and runs the asynchronous optimization
//! loop: pull fresh ticks per pair, move the particle population against
//! the strategy-replay fitness, record the incumbent best, sleep, repeat.
//! Membership changes keep the member set and each agent's swarm field
//! consistent, and broadcasts go through the swarm bus.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::application::lifecycle::LifecycleManager;
use crate::domain::models::{MarketTick, Swarm, SwarmConfig, SwarmPhase};
use crate::domain::ports::{
    scoped_topic, MarketDataSource, Optimizer, SwarmBus, SyndicateError, SyndicateResult,
};
use crate::services::strategy::{evaluate_position, PARAMETER_BOUNDS};

/// Grace period when waiting for the optimization loop to stop.
const STOP_WAIT: Duration = Duration::from_secs(10);

/// One swarm plus its optimization loop.
pub struct SwarmManager {
    swarm: Arc<RwLock<Swarm>>,
    optimizer: Arc<Mutex<Box<dyn Optimizer>>>,
    market: Arc<dyn MarketDataSource>,
    bus: Arc<dyn SwarmBus>,
    lifecycle: Arc<LifecycleManager>,
    base_topic: String,
    shutdown_tx: broadcast::Sender<()>,
    task_handle: RwLock<Option<JoinHandle<()>>>,
}

impl SwarmManager {
    pub fn new(
        config: SwarmConfig,
        optimizer: Box<dyn Optimizer>,
        market: Arc<dyn MarketDataSource>,
        bus: Arc<dyn SwarmBus>,
        lifecycle: Arc<LifecycleManager>,
        base_topic: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            swarm: Arc::new(RwLock::new(Swarm::new(config))),
            optimizer: Arc::new(Mutex::new(optimizer)),
            market,
            bus,
            lifecycle,
            base_topic: base_topic.into(),
            shutdown_tx,
            task_handle: RwLock::new(None),
        }
    }

    pub fn swarm(&self) -> Arc<RwLock<Swarm>> {
        Arc::clone(&self.swarm)
    }

    pub async fn id(&self) -> String {
        self.swarm.read().await.id.clone()
    }

    pub async fn phase(&self) -> SwarmPhase {
        self.swarm.read().await.phase
    }

    // ========================
    // Lifecycle
    // ========================

    /// Initializes the optimizer, primes empty tick buffers, and spawns
    /// the optimization loop.
    pub async fn start(self: &Arc<Self>) -> SyndicateResult<()> {
        {
            let mut swarm = self.swarm.write().await;
            match swarm.phase {
                SwarmPhase::Active | SwarmPhase::Starting => return Ok(()),
                SwarmPhase::Stopping => {
                    return Err(SyndicateError::illegal("start", swarm.phase.as_str()))
                }
                _ => {}
            }
            swarm.phase = SwarmPhase::Starting;
        }

        let (particles, pairs, window) = {
            let swarm = self.swarm.read().await;
            (
                swarm.config.particles,
                swarm.config.pairs.clone(),
                swarm.config.data_window_size,
            )
        };

        {
            let mut optimizer = self.optimizer.lock().expect("optimizer lock");
            optimizer.initialize(particles, &PARAMETER_BOUNDS);
        }

        // Prime pairs that have no buffered data yet
        for pair in &pairs {
            let empty = {
                let swarm = self.swarm.read().await;
                swarm.market_data.get(pair).is_none_or(Vec::is_empty)
            };
            if empty {
                match self.market.fetch(pair, None, window).await {
                    Ok(ticks) => {
                        self.swarm.write().await.ingest_ticks(pair, ticks);
                    }
                    Err(e) => {
                        warn!(pair = %pair, error = %e, "initial market fetch failed");
                        self.swarm.write().await.error_count += 1;
                    }
                }
            }
        }

        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let delay = {
            let swarm = self.swarm.read().await;
            Duration::from_secs(swarm.config.iteration_delay_secs.max(1))
        };

        let handle = tokio::spawn(async move {
            let mut ticker = interval(delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.run_iteration().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("optimization loop received shutdown signal");
                        break;
                    }
                }
            }
        });
        *self.task_handle.write().await = Some(handle);

        let mut swarm = self.swarm.write().await;
        swarm.phase = SwarmPhase::Active;
        info!(swarm_id = %swarm.id, particles, "swarm started");
        Ok(())
    }

    /// Signals the loop and waits bounded; a wait failure leaves the
    /// swarm in error.
    pub async fn stop(&self) -> SyndicateResult<()> {
        {
            let mut swarm = self.swarm.write().await;
            if matches!(swarm.phase, SwarmPhase::Inactive | SwarmPhase::Initialized) {
                return Ok(());
            }
            swarm.phase = SwarmPhase::Stopping;
        }
        let _ = self.shutdown_tx.send(());

        let handle = self.task_handle.write().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_WAIT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = ?e, "optimization loop panicked");
                    self.swarm.write().await.phase = SwarmPhase::Error;
                    return Ok(());
                }
                Err(_) => {
                    error!("timed out waiting for optimization loop");
                    self.swarm.write().await.phase = SwarmPhase::Error;
                    return Err(SyndicateError::WaitTimeout("swarm loop".into()));
                }
            }
        }

        let mut swarm = self.swarm.write().await;
        swarm.phase = SwarmPhase::Inactive;
        info!(swarm_id = %swarm.id, "swarm stopped");
        Ok(())
    }

    /// One optimization iteration: refresh data, move the population,
    /// record the incumbent best.
    async fn run_iteration(&self) {
        let pairs = { self.swarm.read().await.config.pairs.clone() };

        // Keep only ticks newer than what is buffered
        for pair in &pairs {
            let since = { self.swarm.read().await.latest_tick(pair) };
            let window = { self.swarm.read().await.config.data_window_size };
            match self.market.fetch(pair, since, window).await {
                Ok(ticks) if !ticks.is_empty() => {
                    self.swarm.write().await.ingest_ticks(pair, ticks);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(pair = %pair, error = %e, "market fetch failed");
                    self.swarm.write().await.error_count += 1;
                }
            }
        }

        let buffers: Vec<(String, Vec<MarketTick>)> = {
            let swarm = self.swarm.read().await;
            pairs
                .iter()
                .filter_map(|p| swarm.market_data.get(p).map(|b| (p.clone(), b.clone())))
                .collect()
        };

        let (best_fitness, best_position) = {
            let refs: Vec<(&str, &[MarketTick])> = buffers
                .iter()
                .map(|(p, b)| (p.as_str(), b.as_slice()))
                .collect();
            let fitness = move |position: &[f64]| evaluate_position(position, &refs);

            let mut optimizer = self.optimizer.lock().expect("optimizer lock");
            optimizer.update_positions(&fitness);
            optimizer.evaluate(&fitness);
            optimizer.select_leaders();
            (optimizer.best_fitness(), optimizer.best_position())
        };

        let mut swarm = self.swarm.write().await;
        if best_fitness.is_finite() {
            swarm.record_fitness(Utc::now(), best_fitness);
            swarm.record_decision(
                "best_parameters",
                json!({
                    "position": best_position,
                    "fitness": best_fitness,
                }),
            );
            debug!(swarm_id = %swarm.id, best_fitness, "iteration complete");
        } else {
            debug!(swarm_id = %swarm.id, "iteration complete without evaluable data");
        }
    }

    // ========================
    // Membership
    // ========================

    /// Adds an agent: member set, the agent's membership field, bus
    /// connect, and a subscription to the swarm broadcast topic.
    pub async fn add_agent(&self, agent_id: &str) -> SyndicateResult<()> {
        let agent = self.lifecycle.get(agent_id).await?;
        let swarm_id = self.id().await;

        {
            let mut swarm = self.swarm.write().await;
            swarm.members.insert(agent_id.to_string());
            swarm
                .member_status
                .insert(agent_id.to_string(), json!("joined"));
        }
        agent.write().await.swarm_id = Some(swarm_id.clone());

        self.bus.connect(Arc::clone(&agent)).await?;
        let topic = scoped_topic(&self.base_topic, &swarm_id, "broadcast");
        if !self.bus.subscribe(agent, &topic).await? {
            debug!(agent_id = %agent_id, topic = %topic, "broadcast subscription not established");
        }
        info!(agent_id = %agent_id, swarm_id = %swarm_id, "agent joined swarm");
        Ok(())
    }

    /// Removes an agent, clearing its membership field and bus state.
    pub async fn remove_agent(&self, agent_id: &str) -> SyndicateResult<()> {
        let removed = {
            let mut swarm = self.swarm.write().await;
            swarm.member_status.remove(agent_id);
            swarm.members.remove(agent_id)
        };
        if !removed {
            return Err(SyndicateError::NotFound(format!(
                "agent {agent_id} is not a swarm member"
            )));
        }

        if let Ok(agent) = self.lifecycle.get(agent_id).await {
            agent.write().await.swarm_id = None;
        }
        self.bus.disconnect(agent_id).await?;
        info!(agent_id = %agent_id, "agent left swarm");
        Ok(())
    }

    /// Appends to the communication log and fans the payload out on the
    /// swarm broadcast topic.
    pub async fn broadcast(&self, from_agent: &str, payload: Value) -> SyndicateResult<bool> {
        let swarm_id = self.id().await;
        {
            let mut swarm = self.swarm.write().await;
            swarm.communication_log.push(json!({
                "from": from_agent,
                "payload": payload.clone(),
                "timestamp": Utc::now().to_rfc3339(),
            }));
        }
        let topic = scoped_topic(&self.base_topic, &swarm_id, "broadcast");
        self.bus.publish(from_agent, &topic, payload).await
    }

    /// Per-member status getter.
    pub async fn member_status(&self, agent_id: &str) -> Option<Value> {
        self.swarm.read().await.member_status.get(agent_id).cloned()
    }

    /// Per-member status setter; the agent must be a member.
    pub async fn set_member_status(&self, agent_id: &str, status: Value) -> SyndicateResult<()> {
        let mut swarm = self.swarm.write().await;
        if !swarm.members.contains(agent_id) {
            return Err(SyndicateError::NotFound(format!(
                "agent {agent_id} is not a swarm member"
            )));
        }
        swarm.member_status.insert(agent_id.to_string(), status);
        Ok(())
    }

    /// Status summary for the bridge.
    pub async fn status(&self) -> Value {
        let swarm = self.swarm.read().await;
        json!({
            "id": swarm.id,
            "phase": swarm.phase.as_str(),
            "members": swarm.members.len(),
            "pairs": swarm.config.pairs,
            "best_fitness": swarm.best_fitness(),
            "iterations_recorded": swarm.fitness_history.len(),
            "error_count": swarm.error_count,
        })
    }
}
