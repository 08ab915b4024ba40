//! Swarm domain model.
//!
//! A swarm binds a set of member agents to an optimization algorithm and
//! a rolling market-data buffer. The buffer invariant: per pair, ticks
//! are sorted by timestamp, deduplicated on (pair, timestamp), and
//! bounded by the configured window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lifecycle state of a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmPhase {
    Initialized,
    Starting,
    Active,
    Stopping,
    Inactive,
    Error,
}

impl Default for SwarmPhase {
    fn default() -> Self {
        Self::Initialized
    }
}

impl SwarmPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }
}

/// Swarm configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwarmConfig {
    pub name: String,

    /// Algorithm name; `pso` is the built-in
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_particles")]
    pub particles: usize,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Trading pairs the swarm optimizes over
    #[serde(default)]
    pub pairs: Vec<String>,

    /// Agreement fraction required for a collective decision
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    /// Ticks retained per pair
    #[serde(default = "default_data_window")]
    pub data_window_size: usize,

    /// Delay between optimization iterations, in seconds
    #[serde(default = "default_iteration_delay")]
    pub iteration_delay_secs: u64,
}

fn default_algorithm() -> String {
    "pso".to_string()
}

const fn default_particles() -> usize {
    20
}

const fn default_iterations() -> usize {
    100
}

const fn default_consensus_threshold() -> f64 {
    0.7
}

const fn default_data_window() -> usize {
    500
}

const fn default_iteration_delay() -> u64 {
    5
}

impl SwarmConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: default_algorithm(),
            particles: default_particles(),
            iterations: default_iterations(),
            pairs: Vec::new(),
            consensus_threshold: default_consensus_threshold(),
            data_window_size: default_data_window(),
            iteration_delay_secs: default_iteration_delay(),
        }
    }

    pub fn with_pairs(mut self, pairs: Vec<String>) -> Self {
        self.pairs = pairs;
        self
    }
}

/// One market data point for a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// The swarm entity.
#[derive(Debug)]
pub struct Swarm {
    /// Swarms are identified by name
    pub id: String,
    pub config: SwarmConfig,
    pub phase: SwarmPhase,
    /// Rolling tick buffer per pair, sorted and deduplicated
    pub market_data: HashMap<String, Vec<MarketTick>>,
    pub performance: HashMap<String, f64>,
    pub fitness_history: BTreeMap<DateTime<Utc>, f64>,
    pub members: HashSet<String>,
    /// Free-form per-member status, maintained by the manager
    pub member_status: HashMap<String, Value>,
    pub communication_log: Vec<Value>,
    pub decisions: HashMap<String, Value>,
    pub error_count: u64,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            id: config.name.clone(),
            config,
            phase: SwarmPhase::Initialized,
            market_data: HashMap::new(),
            performance: HashMap::new(),
            fitness_history: BTreeMap::new(),
            members: HashSet::new(),
            member_status: HashMap::new(),
            communication_log: Vec::new(),
            decisions: HashMap::new(),
            error_count: 0,
        }
    }

    /// Merges new ticks into a pair's buffer, restoring the sorted,
    /// deduplicated, windowed invariant.
    pub fn ingest_ticks(&mut self, pair: &str, ticks: Vec<MarketTick>) {
        let window = self.config.data_window_size;
        let buffer = self.market_data.entry(pair.to_string()).or_default();
        buffer.extend(ticks.into_iter().filter(|t| t.pair == pair));
        buffer.sort_by_key(|t| t.timestamp);
        buffer.dedup_by_key(|t| t.timestamp);
        if window > 0 && buffer.len() > window {
            let excess = buffer.len() - window;
            buffer.drain(..excess);
        }
    }

    /// Most recent tick timestamp for a pair, if any.
    pub fn latest_tick(&self, pair: &str) -> Option<DateTime<Utc>> {
        self.market_data
            .get(pair)
            .and_then(|buf| buf.last())
            .map(|t| t.timestamp)
    }

    /// Records an iteration's best fitness.
    pub fn record_fitness(&mut self, at: DateTime<Utc>, fitness: f64) {
        self.fitness_history.insert(at, fitness);
        self.performance.insert("best_fitness".into(), fitness);
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.performance.get("best_fitness").copied()
    }

    /// Records a collective decision under a key.
    pub fn record_decision(&mut self, key: impl Into<String>, value: Value) {
        self.decisions.insert(key.into(), value);
    }

    /// Whether `agreeing` of `total` members clears the consensus
    /// threshold.
    pub fn reached_consensus(&self, agreeing: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        agreeing as f64 / total as f64 >= self.config.consensus_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tick(pair: &str, secs: i64, price: f64) -> MarketTick {
        MarketTick {
            pair: pair.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            price,
            volume: 1.0,
        }
    }

    #[test]
    fn ingest_sorts_and_dedups() {
        let mut swarm = Swarm::new(SwarmConfig::new("alpha"));
        swarm.ingest_ticks(
            "ETH-USDC",
            vec![
                tick("ETH-USDC", 30, 3.0),
                tick("ETH-USDC", 10, 1.0),
                tick("ETH-USDC", 20, 2.0),
                tick("ETH-USDC", 10, 1.5),
            ],
        );

        let buffer = &swarm.market_data["ETH-USDC"];
        let stamps: Vec<i64> = buffer.iter().map(|t| t.timestamp.timestamp()).collect();
        assert_eq!(stamps, vec![10, 20, 30]);
    }

    #[test]
    fn ingest_prunes_to_window() {
        let mut config = SwarmConfig::new("alpha");
        config.data_window_size = 3;
        let mut swarm = Swarm::new(config);

        swarm.ingest_ticks(
            "ETH-USDC",
            (0..10).map(|i| tick("ETH-USDC", i, i as f64)).collect(),
        );

        let buffer = &swarm.market_data["ETH-USDC"];
        assert_eq!(buffer.len(), 3);
        // Oldest ticks dropped first
        assert_eq!(buffer[0].timestamp.timestamp(), 7);
    }

    #[test]
    fn ingest_ignores_mismatched_pair() {
        let mut swarm = Swarm::new(SwarmConfig::new("alpha"));
        swarm.ingest_ticks("ETH-USDC", vec![tick("BTC-USDC", 1, 1.0)]);
        assert!(swarm.market_data["ETH-USDC"].is_empty());
    }

    #[test]
    fn consensus_threshold() {
        let swarm = Swarm::new(SwarmConfig::new("alpha"));
        // Default threshold is 0.7
        assert!(swarm.reached_consensus(7, 10));
        assert!(!swarm.reached_consensus(6, 10));
        assert!(!swarm.reached_consensus(0, 0));
    }

    #[test]
    fn fitness_history_is_time_ordered() {
        let mut swarm = Swarm::new(SwarmConfig::new("alpha"));
        let t1 = Utc.timestamp_opt(100, 0).unwrap();
        let t0 = Utc.timestamp_opt(50, 0).unwrap();
        swarm.record_fitness(t1, -1.5);
        swarm.record_fitness(t0, -0.5);

        let values: Vec<f64> = swarm.fitness_history.values().copied().collect();
        assert_eq!(values, vec![-0.5, -1.5]);
        assert_eq!(swarm.best_fitness(), Some(-1.5));
    }
}
