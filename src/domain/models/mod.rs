//! Domain models for the Syndicate runtime.
//!
//! Pure data types with no I/O: the agent entity and its configuration,
//! messages and the priority queue, LRU working memory, skills, metrics,
//! health checks, swarms, and the process configuration.

pub mod agent;
pub mod config;
pub mod health;
pub mod memory;
pub mod message;
pub mod metric;
pub mod queue;
pub mod skill;
pub mod swarm;

pub use agent::{
    Agent, AgentConfig, AgentKind, AgentState, AgentStatus, LlmProviderConfig, MemoryConfig,
    TaskRecord,
};
pub use config::{
    AgentTuning, BridgeConfig, Config, LlmConfig, LoggingConfig, MetricsConfig, StorageConfig,
    SwarmSettings,
};
pub use health::{HealthCheck, HealthStatus};
pub use memory::LruMemory;
pub use message::{AgentMessage, PRIORITY_DEFAULT, PRIORITY_MAX, PRIORITY_MIN};
pub use metric::{Metric, MetricSummary, MetricType};
pub use queue::{MessageQueue, QueueEntry};
pub use skill::{Skill, SkillState, DEFAULT_XP_DECAY};
pub use swarm::{MarketTick, Swarm, SwarmConfig, SwarmPhase};
