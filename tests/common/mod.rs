//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;

use syndicate::application::SyndicateRuntime;
use syndicate::domain::models::Config;
use syndicate::domain::ports::{NullLlmClient, NullMarketData};
use syndicate::infrastructure::bus::InMemoryBus;
use syndicate::infrastructure::market::SimulatedMarketFeed;

/// Config tuned for fast test loops, with storage under a temp dir.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.path = dir
        .path()
        .join("agents.json")
        .to_string_lossy()
        .into_owned();
    config.storage.backup_enabled = false;
    config.agent.default_sleep_ms = 50;
    config.agent.paused_sleep_ms = 25;
    config.agent.monitoring_enabled = false;
    config.swarm.enabled = true;
    config
}

/// Boots a runtime over an in-memory bus and a null market feed.
pub async fn test_runtime() -> (Arc<SyndicateRuntime>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);
    let runtime = SyndicateRuntime::bootstrap(
        config,
        Arc::new(InMemoryBus::new(100)),
        Arc::new(NullLlmClient),
        Arc::new(NullMarketData),
    )
    .await
    .expect("bootstrap");
    (runtime, dir)
}

/// Boots a runtime whose market feed produces simulated ticks.
pub async fn test_runtime_with_market() -> (Arc<SyndicateRuntime>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);
    let runtime = SyndicateRuntime::bootstrap(
        config,
        Arc::new(InMemoryBus::new(100)),
        Arc::new(NullLlmClient),
        Arc::new(SimulatedMarketFeed::new(1234)),
    )
    .await
    .expect("bootstrap");
    (runtime, dir)
}

/// Polls until `predicate` holds or the timeout lapses.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if predicate().await {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
