use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

use super::store::ConfigStore;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Storage path cannot be empty")]
    EmptyStoragePath,

    #[error("Invalid swarm backend: {0}. Must be one of: none, memory, redis, nats, zeromq")]
    InvalidSwarmBackend(String),

    #[error("Invalid xp_decay_rate: {0}. Must be in (0, 1]")]
    InvalidXpDecay(f64),

    #[error("Invalid default_sleep_ms: {0}. Must be positive")]
    InvalidSleep(u64),

    #[error("Invalid channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Invalid collection_interval: {0}. Must be positive")]
    InvalidCollectionInterval(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. syndicate.yaml (project root)
    /// 3. .syndicate/config.yaml
    /// 4. .syndicate/local.yaml (local overrides, optional)
    /// 5. Environment variables (SYNDICATE_* prefix, highest priority)
    pub fn load() -> Result<(Config, ConfigStore)> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file("syndicate.yaml"))
                .merge(Yaml::file(".syndicate/config.yaml"))
                .merge(Yaml::file(".syndicate/local.yaml"))
                .merge(Env::prefixed("SYNDICATE_").split("__")),
        )
    }

    /// Load configuration from a specific file over the defaults
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<(Config, ConfigStore)> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(path.as_ref()))
                .merge(Env::prefixed("SYNDICATE_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<(Config, ConfigStore)> {
        let config: Config = figment
            .extract()
            .context("Failed to extract configuration from figment")?;
        let raw: serde_json::Value = figment
            .extract()
            .context("Failed to extract raw configuration tree")?;

        Self::validate(&config)?;
        Ok((config, ConfigStore::from_value(raw)))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.storage.path.is_empty() {
            return Err(ConfigError::EmptyStoragePath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_backends = ["none", "memory", "redis", "nats", "zeromq"];
        if !valid_backends.contains(&config.swarm.backend.as_str()) {
            return Err(ConfigError::InvalidSwarmBackend(config.swarm.backend.clone()));
        }

        if config.agent.xp_decay_rate <= 0.0 || config.agent.xp_decay_rate > 1.0 {
            return Err(ConfigError::InvalidXpDecay(config.agent.xp_decay_rate));
        }

        if config.agent.default_sleep_ms == 0 {
            return Err(ConfigError::InvalidSleep(config.agent.default_sleep_ms));
        }

        if config.swarm.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(config.swarm.channel_capacity));
        }

        if config.metrics.collection_interval == 0 {
            return Err(ConfigError::InvalidCollectionInterval(
                config.metrics.collection_interval,
            ));
        }

        Ok(())
    }
}
