//! Swarm bus backends and backend selection.
//!
//! The backend is chosen from configuration. External broker backends
//! (redis, nats, zeromq) are recognized names, but when the broker
//! client is not compiled in the selection degrades to the null bus
//! with a warning instead of failing the process.

pub mod memory;

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::models::SwarmSettings;
use crate::domain::ports::{NullSwarmBus, SwarmBus};

pub use memory::InMemoryBus;

/// Builds the configured bus backend.
pub fn from_settings(settings: &SwarmSettings) -> Arc<dyn SwarmBus> {
    if !settings.enabled {
        info!("swarm messaging disabled, using null bus");
        return Arc::new(NullSwarmBus);
    }

    match settings.backend.as_str() {
        "memory" => {
            info!(capacity = settings.channel_capacity, "using in-memory swarm bus");
            Arc::new(InMemoryBus::new(settings.channel_capacity))
        }
        "none" => Arc::new(NullSwarmBus),
        backend @ ("redis" | "nats" | "zeromq") => {
            warn!(
                backend = %backend,
                connection_string = %settings.connection_string,
                "broker backend not available in this build, degrading to null bus"
            );
            Arc::new(NullSwarmBus)
        }
        other => {
            warn!(backend = %other, "unknown swarm backend, degrading to null bus");
            Arc::new(NullSwarmBus)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, backend: &str) -> SwarmSettings {
        SwarmSettings {
            enabled,
            backend: backend.to_string(),
            connection_string: String::new(),
            default_topic: "syndicate".to_string(),
            channel_capacity: 100,
        }
    }

    #[test]
    fn disabled_swarm_gets_null_bus() {
        assert_eq!(from_settings(&settings(false, "memory")).name(), "null");
    }

    #[test]
    fn memory_backend_selected() {
        assert_eq!(from_settings(&settings(true, "memory")).name(), "memory");
    }

    #[test]
    fn broker_backends_degrade_to_null() {
        for backend in ["redis", "nats", "zeromq", "imaginary"] {
            assert_eq!(from_settings(&settings(true, backend)).name(), "null");
        }
    }
}
