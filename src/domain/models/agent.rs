//! Agent domain model.
//!
//! An agent is the root entity of the runtime: a lifecycle state machine
//! carrying its own working memory, task history, skill table, and
//! priority message queue. Only the lifecycle manager mutates the state
//! field from outside; the loop reads it and transitions to
//! stopped/error on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use super::memory::LruMemory;
use super::message::AgentMessage;
use super::queue::MessageQueue;
use super::skill::SkillState;

/// What class of work an agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Trading,
    Monitor,
    Arbitrage,
    DataCollection,
    Notification,
    Custom,
}

impl Default for AgentKind {
    fn default() -> Self {
        Self::Custom
    }
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trading => "trading",
            Self::Monitor => "monitor",
            Self::Arbitrage => "arbitrage",
            Self::DataCollection => "data_collection",
            Self::Notification => "notification",
            Self::Custom => "custom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trading" => Some(Self::Trading),
            "monitor" => Some(Self::Monitor),
            "arbitrage" => Some(Self::Arbitrage),
            "data_collection" | "data-collection" => Some(Self::DataCollection),
            "notification" => Some(Self::Notification),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Integer code used in the persisted snapshot document.
    pub fn code(&self) -> u8 {
        match self {
            Self::Trading => 1,
            Self::Monitor => 2,
            Self::Arbitrage => 3,
            Self::DataCollection => 4,
            Self::Notification => 5,
            Self::Custom => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Trading),
            2 => Some(Self::Monitor),
            3 => Some(Self::Arbitrage),
            4 => Some(Self::DataCollection),
            5 => Some(Self::Notification),
            6 => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Created,
    Initializing,
    Running,
    Paused,
    Stopped,
    Error,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Created
    }
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "initializing" => Some(Self::Initializing),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Integer code used in the persisted snapshot document.
    pub fn code(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Initializing => 1,
            Self::Running => 2,
            Self::Paused => 3,
            Self::Stopped => 4,
            Self::Error => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Created),
            1 => Some(Self::Initializing),
            2 => Some(Self::Running),
            3 => Some(Self::Paused),
            4 => Some(Self::Stopped),
            5 => Some(Self::Error),
            _ => None,
        }
    }

    /// States the loop exits from.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

/// Working memory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Maximum entries (0 = unbounded)
    #[serde(default)]
    pub max_size: usize,

    /// Eviction policy name; `lru` is the only implemented policy
    #[serde(default = "default_retention_policy")]
    pub retention_policy: String,
}

fn default_retention_policy() -> String {
    "lru".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            retention_policy: default_retention_policy(),
        }
    }
}

/// Per-agent LLM provider selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct LlmProviderConfig {
    /// Provider name; empty selects the process-wide default
    #[serde(default)]
    pub provider: String,

    /// Model override for this agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Immutable per-agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    pub name: String,

    #[serde(default)]
    pub kind: AgentKind,

    /// Ability names the agent declares; each that is also a registered
    /// skill becomes an entry in the agent's skill table
    #[serde(default)]
    pub abilities: Vec<String>,

    /// Chain identifiers the agent may touch
    #[serde(default)]
    pub chains: Vec<String>,

    /// Free-form parameters, also consulted for swarm scoping
    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default)]
    pub llm: LlmProviderConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default = "default_max_task_history")]
    pub max_task_history: usize,
}

const fn default_max_task_history() -> usize {
    100
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            abilities: Vec::new(),
            chains: Vec::new(),
            parameters: Map::new(),
            llm: LlmProviderConfig::default(),
            memory: MemoryConfig::default(),
            max_task_history: default_max_task_history(),
        }
    }

    pub fn with_abilities(mut self, abilities: Vec<String>) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_memory_cap(mut self, max_size: usize) -> Self {
        self.memory.max_size = max_size;
        self
    }
}

/// One completed direct task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub timestamp: DateTime<Utc>,
    pub input: Value,
    pub output: Value,
}

/// The root agent entity.
#[derive(Debug)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub state: AgentState,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub config: AgentConfig,
    pub memory: LruMemory,
    pub task_history: VecDeque<TaskRecord>,
    pub skills: HashMap<String, SkillState>,
    pub queue: MessageQueue<AgentMessage>,
    /// Zero-or-one swarm membership
    pub swarm_id: Option<String>,
    /// Signaled on enqueue so an idle loop wakes without waiting out
    /// its full sleep
    pub wakeup: Arc<Notify>,
}

impl Agent {
    /// Builds a fresh agent from its configuration and a pre-resolved
    /// skill table (declared abilities that exist in the skill registry).
    pub fn new(config: AgentConfig, skills: HashMap<String, SkillState>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: config.name.clone(),
            kind: config.kind,
            state: AgentState::Created,
            created: now,
            updated: now,
            memory: LruMemory::new(config.memory.max_size),
            task_history: VecDeque::new(),
            skills,
            queue: MessageQueue::new(),
            swarm_id: None,
            wakeup: Arc::new(Notify::new()),
            config,
        }
    }

    /// Sets the lifecycle state and bumps `updated`.
    pub fn set_state(&mut self, state: AgentState) {
        self.state = state;
        self.updated = Utc::now();
    }

    /// Bumps `updated` without a state change. The loop calls this each
    /// iteration so stall detection has a liveness signal to read.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    /// Appends a task record, evicting from the head while over cap.
    pub fn record_task(&mut self, input: Value, output: Value) {
        self.task_history.push_back(TaskRecord {
            timestamp: Utc::now(),
            input,
            output,
        });
        while self.task_history.len() > self.config.max_task_history {
            self.task_history.pop_front();
        }
    }

    /// Enqueues a message using the message's own priority.
    pub fn enqueue(&mut self, message: AgentMessage) {
        let priority = message.priority;
        self.enqueue_with_priority(message, priority);
    }

    /// Enqueues a message at an explicit priority (bus deliveries carry
    /// the payload priority rather than the envelope's).
    pub fn enqueue_with_priority(&mut self, message: AgentMessage, priority: u8) {
        self.queue.enqueue(message, priority);
        self.wakeup.notify_one();
    }

    /// Summary used by `status` reporting.
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            state: self.state,
            uptime_secs: (Utc::now() - self.updated).num_seconds().max(0),
            task_history_len: self.task_history.len(),
            queue_len: self.queue.len(),
            memory_len: self.memory.len(),
            updated: self.updated,
        }
    }
}

/// Point-in-time agent status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub state: AgentState,
    pub uptime_secs: i64,
    pub task_history_len: usize,
    pub queue_len: usize,
    pub memory_len: usize,
    pub updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_agent(max_history: usize) -> Agent {
        let mut config = AgentConfig::new("tester", AgentKind::Custom);
        config.max_task_history = max_history;
        Agent::new(config, HashMap::new())
    }

    #[test]
    fn new_agent_starts_created() {
        let agent = test_agent(10);
        assert_eq!(agent.state, AgentState::Created);
        assert!(agent.task_history.is_empty());
        assert!(agent.queue.is_empty());
        assert!(agent.swarm_id.is_none());
    }

    #[test]
    fn task_history_evicts_from_head() {
        let mut agent = test_agent(3);
        for i in 0..5 {
            agent.record_task(json!({ "n": i }), json!({ "ok": true }));
        }

        assert_eq!(agent.task_history.len(), 3);
        assert_eq!(agent.task_history.front().unwrap().input, json!({ "n": 2 }));
        assert_eq!(agent.task_history.back().unwrap().input, json!({ "n": 4 }));
    }

    #[test]
    fn set_state_bumps_updated() {
        let mut agent = test_agent(10);
        let before = agent.updated;
        std::thread::sleep(std::time::Duration::from_millis(5));
        agent.set_state(AgentState::Running);
        assert!(agent.updated > before);
        assert_eq!(agent.state, AgentState::Running);
    }

    #[test]
    fn kind_and_state_codes_round_trip() {
        for kind in [
            AgentKind::Trading,
            AgentKind::Monitor,
            AgentKind::Arbitrage,
            AgentKind::DataCollection,
            AgentKind::Notification,
            AgentKind::Custom,
        ] {
            assert_eq!(AgentKind::from_code(kind.code()), Some(kind));
            assert_eq!(AgentKind::from_str(kind.as_str()), Some(kind));
        }
        for state in [
            AgentState::Created,
            AgentState::Initializing,
            AgentState::Running,
            AgentState::Paused,
            AgentState::Stopped,
            AgentState::Error,
        ] {
            assert_eq!(AgentState::from_code(state.code()), Some(state));
            assert_eq!(AgentState::from_str(state.as_str()), Some(state));
        }
    }

    #[test]
    fn enqueue_orders_by_message_priority() {
        let mut agent = test_agent(10);
        let low = AgentMessage::new("x", "tester", "task", Map::new(), 5);
        let high = AgentMessage::new("x", "tester", "task", Map::new(), 1);
        let low_id = low.id;
        let high_id = high.id;

        agent.enqueue(low);
        agent.enqueue(high);

        assert_eq!(agent.queue.dequeue().unwrap().id, high_id);
        assert_eq!(agent.queue.dequeue().unwrap().id, low_id);
    }
}
