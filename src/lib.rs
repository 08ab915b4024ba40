//! Syndicate - Agent Swarm Runtime
//!
//! A runtime for long-lived autonomous agents organized into swarms:
//! - Per-agent cooperative loops driving scheduled skills and a
//!   priority message queue
//! - Lifecycle management with atomic snapshot persistence
//! - LRU working memory and bounded task history per agent
//! - In-process metrics with per-agent ring buffers
//! - Pluggable swarm bus (null, in-memory, broker-backed)
//! - Swarm optimization over a particle swarm and a rule-based
//!   trading-strategy fitness
//! - A command-dispatch bridge surface for external clients

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use application::SyndicateRuntime;
pub use domain::models::Config;
