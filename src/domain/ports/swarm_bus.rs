//! Swarm bus port - publish/subscribe capability for swarm messaging.
//!
//! Backends range from a null sink through an in-process channel fabric
//! to external brokers. The capability set is small enough that a
//! distributed backend slots in without touching the core.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::models::Agent;
use crate::domain::ports::errors::SyndicateResult;

/// An agent shared across tasks. Queue pushes are safe from any task;
/// pops belong to the owning loop.
pub type SharedAgent = Arc<RwLock<Agent>>;

/// Publish/subscribe capability scoped to swarm topics.
///
/// `publish` and `subscribe` report broker failures as an `Ok(false)`
/// result after logging; hard errors are reserved for misuse.
#[async_trait]
pub trait SwarmBus: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Registers an agent with the bus.
    async fn connect(&self, agent: SharedAgent) -> SyndicateResult<()>;

    /// Tears down all subscriptions for an agent and releases backend
    /// resources.
    async fn disconnect(&self, agent_id: &str) -> SyndicateResult<()>;

    /// Publishes a payload on a scoped topic. Returns whether the
    /// message was accepted by the backend.
    async fn publish(&self, agent_id: &str, topic: &str, payload: Value) -> SyndicateResult<bool>;

    /// Subscribes an agent to a scoped topic; deliveries land in the
    /// agent's priority queue. Returns whether the subscription took.
    async fn subscribe(&self, agent: SharedAgent, topic: &str) -> SyndicateResult<bool>;
}

/// Builds the fully scoped topic `<base>.<swarm_id>.<topic>`.
pub fn scoped_topic(base: &str, swarm_id: &str, topic: &str) -> String {
    format!("{base}.{swarm_id}.{topic}")
}

/// Reads an agent's swarm scope from its parameters, defaulting to
/// `default` when unset.
pub fn swarm_scope(agent: &Agent) -> String {
    agent
        .swarm_id
        .clone()
        .or_else(|| {
            agent
                .config
                .parameters
                .get("swarm_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "default".to_string())
}

/// Wraps a user payload in the wire envelope: the payload's own fields
/// plus `_source_agent`, `_timestamp`, and `_topic`.
pub fn envelope(payload: &Value, source_agent: &str, topic: &str) -> Value {
    let mut map = match payload {
        Value::Object(obj) => obj.clone(),
        other => {
            let mut m = Map::new();
            m.insert("body".into(), other.clone());
            m
        }
    };
    map.insert("_source_agent".into(), Value::from(source_agent));
    map.insert("_timestamp".into(), Value::from(Utc::now().to_rfc3339()));
    map.insert("_topic".into(), Value::from(topic));
    Value::Object(map)
}

/// Splits a delivered envelope into (user payload, source agent, topic).
///
/// The augmenting fields are stripped so subscribers enqueue only the
/// user payload.
pub fn strip_envelope(delivered: Value) -> (Map<String, Value>, Option<String>, Option<String>) {
    let mut payload = match delivered {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    let source = payload
        .remove("_source_agent")
        .and_then(|v| v.as_str().map(str::to_string));
    let topic = payload
        .remove("_topic")
        .and_then(|v| v.as_str().map(str::to_string));
    payload.remove("_timestamp");
    (payload, source, topic)
}

/// Priority carried by a payload, for queue insertion (default 0).
pub fn payload_priority(payload: &Map<String, Value>) -> u8 {
    payload
        .get("priority")
        .and_then(Value::as_u64)
        .map_or(0, |p| u8::try_from(p).unwrap_or(u8::MAX))
}

/// Null backend: logs and drops every operation.
///
/// Selected when swarm messaging is disabled or when a configured
/// external backend is unavailable.
#[derive(Debug, Default)]
pub struct NullSwarmBus;

#[async_trait]
impl SwarmBus for NullSwarmBus {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn connect(&self, agent: SharedAgent) -> SyndicateResult<()> {
        let id = agent.read().await.id.clone();
        debug!(agent_id = %id, "null bus: connect dropped");
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> SyndicateResult<()> {
        debug!(agent_id = %agent_id, "null bus: disconnect dropped");
        Ok(())
    }

    async fn publish(&self, agent_id: &str, topic: &str, _payload: Value) -> SyndicateResult<bool> {
        debug!(agent_id = %agent_id, topic = %topic, "null bus: publish dropped");
        Ok(false)
    }

    async fn subscribe(&self, agent: SharedAgent, topic: &str) -> SyndicateResult<bool> {
        let id = agent.read().await.id.clone();
        debug!(agent_id = %id, topic = %topic, "null bus: subscribe dropped");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_topic_format() {
        assert_eq!(scoped_topic("syndicate", "alpha", "signals"), "syndicate.alpha.signals");
    }

    #[test]
    fn envelope_adds_and_strip_removes() {
        let payload = json!({ "priority": 2, "body": "hi" });
        let wrapped = envelope(&payload, "agent-1", "syndicate.alpha.signals");

        assert_eq!(wrapped["_source_agent"], json!("agent-1"));
        assert_eq!(wrapped["_topic"], json!("syndicate.alpha.signals"));
        assert!(wrapped.get("_timestamp").is_some());

        let (stripped, source, topic) = strip_envelope(wrapped);
        assert_eq!(source.as_deref(), Some("agent-1"));
        assert_eq!(topic.as_deref(), Some("syndicate.alpha.signals"));
        assert!(!stripped.contains_key("_source_agent"));
        assert!(!stripped.contains_key("_timestamp"));
        assert_eq!(stripped["body"], json!("hi"));
    }

    #[test]
    fn non_object_payload_is_wrapped() {
        let wrapped = envelope(&json!("ping"), "agent-1", "t");
        assert_eq!(wrapped["body"], json!("ping"));
    }

    #[test]
    fn swarm_scope_prefers_membership_then_parameters() {
        use crate::domain::models::{Agent, AgentConfig, AgentKind};
        use std::collections::HashMap;

        let mut config = AgentConfig::new("scoped", AgentKind::Custom);
        config
            .parameters
            .insert("swarm_id".to_string(), json!("from-params"));
        let mut agent = Agent::new(config, HashMap::new());
        assert_eq!(swarm_scope(&agent), "from-params");

        agent.swarm_id = Some("joined".to_string());
        assert_eq!(swarm_scope(&agent), "joined");

        let plain = Agent::new(AgentConfig::new("plain", AgentKind::Custom), HashMap::new());
        assert_eq!(swarm_scope(&plain), "default");
    }

    #[test]
    fn payload_priority_defaults_to_zero() {
        let (payload, _, _) = strip_envelope(json!({ "body": "x" }));
        assert_eq!(payload_priority(&payload), 0);

        let (payload, _, _) = strip_envelope(json!({ "priority": 2 }));
        assert_eq!(payload_priority(&payload), 2);
    }
}
