use serde::{Deserialize, Serialize};

/// Main configuration structure for Syndicate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Snapshot storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Agent loop and supervision tuning
    #[serde(default)]
    pub agent: AgentTuning,

    /// Metrics store configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Swarm bus configuration
    #[serde(default)]
    pub swarm: SwarmSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LLM collaborator configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Bridge transport configuration
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Path to the agent registry snapshot file
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Persist the registry on lifecycle transitions and at exit
    #[serde(default = "default_auto_persist")]
    pub auto_persist: bool,

    /// Number of rotated snapshot backups to keep
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,

    /// Rotate a backup before each save
    #[serde(default = "default_backup_enabled")]
    pub backup_enabled: bool,
}

fn default_storage_path() -> String {
    ".syndicate/agents.json".to_string()
}

const fn default_auto_persist() -> bool {
    true
}

const fn default_backup_count() -> u32 {
    5
}

const fn default_backup_enabled() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            auto_persist: default_auto_persist(),
            backup_count: default_backup_count(),
            backup_enabled: default_backup_enabled(),
        }
    }
}

/// Agent loop and supervision tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentTuning {
    /// Task history entries kept per agent
    #[serde(default = "default_max_task_history")]
    pub max_task_history: usize,

    /// Multiplicative XP decay applied each loop iteration
    #[serde(default = "default_xp_decay_rate")]
    pub xp_decay_rate: f64,

    /// Idle sleep between loop iterations, in milliseconds
    #[serde(default = "default_sleep_ms")]
    pub default_sleep_ms: u64,

    /// Sleep while paused, in milliseconds
    #[serde(default = "default_paused_sleep_ms")]
    pub paused_sleep_ms: u64,

    /// Restart agents whose loop died while marked running
    #[serde(default)]
    pub auto_restart: bool,

    /// Enable the health monitor
    #[serde(default = "default_monitoring_enabled")]
    pub monitoring_enabled: bool,

    /// Health monitor scan interval, in seconds
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: u64,

    /// Seconds without a state update before a running agent is flagged
    #[serde(default = "default_max_stall_seconds")]
    pub max_stall_seconds: i64,
}

const fn default_max_task_history() -> usize {
    100
}

const fn default_xp_decay_rate() -> f64 {
    0.999
}

const fn default_sleep_ms() -> u64 {
    1000
}

const fn default_paused_sleep_ms() -> u64 {
    500
}

const fn default_monitoring_enabled() -> bool {
    true
}

const fn default_monitor_interval() -> u64 {
    30
}

const fn default_max_stall_seconds() -> i64 {
    300
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            max_task_history: default_max_task_history(),
            xp_decay_rate: default_xp_decay_rate(),
            default_sleep_ms: default_sleep_ms(),
            paused_sleep_ms: default_paused_sleep_ms(),
            auto_restart: false,
            monitoring_enabled: default_monitoring_enabled(),
            monitor_interval: default_monitor_interval(),
            max_stall_seconds: default_max_stall_seconds(),
        }
    }
}

/// Metrics store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Expected collection cadence, in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,

    /// Retention window, in seconds
    #[serde(default = "default_retention_period")]
    pub retention_period: u64,
}

const fn default_metrics_enabled() -> bool {
    true
}

const fn default_collection_interval() -> u64 {
    60
}

const fn default_retention_period() -> u64 {
    86_400
}

impl MetricsConfig {
    /// Ring buffer capacity derived from the retention window.
    pub fn ring_capacity(&self) -> usize {
        let interval = self.collection_interval.max(1);
        let slots = self.retention_period.div_ceil(interval) as usize;
        slots.max(100)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            collection_interval: default_collection_interval(),
            retention_period: default_retention_period(),
        }
    }
}

/// Swarm bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwarmSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Backend name: none, memory, redis, nats, zeromq
    #[serde(default = "default_swarm_backend")]
    pub backend: String,

    /// Broker connection string for external backends
    #[serde(default)]
    pub connection_string: String,

    /// Base topic under which swarm topics are scoped
    #[serde(default = "default_swarm_topic")]
    pub default_topic: String,

    /// Bound for per-topic in-memory channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_swarm_backend() -> String {
    "memory".to_string()
}

fn default_swarm_topic() -> String {
    "syndicate".to_string()
}

const fn default_channel_capacity() -> usize {
    100
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_swarm_backend(),
            connection_string: String::new(),
            default_topic: default_swarm_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rotated file output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// LLM collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key; absent key degrades the client to null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Outbound request budget per second
    #[serde(default = "default_llm_requests_per_second")]
    pub requests_per_second: u32,

    /// Request timeout, in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_llm_requests_per_second() -> u32 {
    5
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            requests_per_second: default_llm_requests_per_second(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Bridge transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_enabled")]
    pub enabled: bool,

    /// Listen address for the HTTP transport
    #[serde(default = "default_bridge_listen")]
    pub listen: String,
}

const fn default_bridge_enabled() -> bool {
    true
}

fn default_bridge_listen() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_bridge_enabled(),
            listen: default_bridge_listen(),
        }
    }
}
