//! Agent health monitor.
//!
//! A supervisory task scanning loop liveness on an interval. Flags dead
//! loops as critical (optionally restarting them) and stalled loops as
//! warnings, and publishes each status as a gauge metric. Restarts are
//! dispatched asynchronously so the scan never holds a lock `start`
//! needs.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::application::lifecycle::LifecycleManager;
use crate::domain::models::{AgentState, AgentTuning, HealthCheck, HealthStatus, MetricType};
use crate::services::MetricsStore;

/// Periodic supervisor over agent loops.
pub struct HealthMonitor {
    lifecycle: Arc<LifecycleManager>,
    metrics: Arc<MetricsStore>,
    tuning: AgentTuning,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthMonitor {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        metrics: Arc<MetricsStore>,
        tuning: AgentTuning,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            lifecycle,
            metrics,
            tuning,
            shutdown_tx,
        }
    }

    /// Spawns the scan loop. Returns the supervising handle.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_secs(self.tuning.monitor_interval.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            info!(interval_secs = period.as_secs(), "health monitor started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.scan().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("health monitor received shutdown signal");
                        break;
                    }
                }
            }
        })
    }

    /// Signals the scan loop to exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One scan over every agent with a launched loop.
    pub async fn scan(&self) -> Vec<HealthCheck> {
        let probes = self.lifecycle.probe_loops().await;
        let now = chrono::Utc::now();
        let mut checks = Vec::new();

        for probe in probes {
            // Agents that never launched a loop are not assessed
            let Some(finished) = probe.loop_finished else {
                continue;
            };

            let check = if finished && probe.state == AgentState::Running {
                let check = HealthCheck::new(
                    probe.agent_id.clone(),
                    HealthStatus::Critical,
                    "loop task finished while state is running",
                );
                if self.tuning.auto_restart {
                    let lifecycle = Arc::clone(&self.lifecycle);
                    let id = probe.agent_id.clone();
                    // Asynchronous dispatch: the restart must not run
                    // inside this scan
                    tokio::spawn(async move {
                        if let Err(e) = lifecycle.start(&id).await {
                            warn!(agent_id = %id, error = %e, "auto-restart failed");
                        }
                    });
                    warn!(agent_id = %probe.agent_id, "dead loop detected, auto-restart scheduled");
                } else {
                    warn!(agent_id = %probe.agent_id, "dead loop detected");
                }
                check
            } else if probe.state == AgentState::Running {
                let stall_secs = now.signed_duration_since(probe.updated).num_seconds();
                if stall_secs > self.tuning.max_stall_seconds {
                    warn!(agent_id = %probe.agent_id, stall_secs, "agent loop stalled");
                    HealthCheck::new(probe.agent_id.clone(), HealthStatus::Warning, "loop stalled")
                        .with_detail("stall_secs", json!(stall_secs))
                } else {
                    HealthCheck::new(probe.agent_id.clone(), HealthStatus::Healthy, "ok")
                }
            } else {
                HealthCheck::new(probe.agent_id.clone(), HealthStatus::Healthy, "ok")
            };

            self.metrics.record(
                &probe.agent_id,
                "health.status",
                json!(check.status.as_gauge()),
                MetricType::Gauge,
                HashMap::from([("agent".to_string(), probe.name.clone())]),
            );
            checks.push(check);
        }
        checks
    }
}
