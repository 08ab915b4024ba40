//! Inter-agent message model.
//!
//! Messages are the single unit of work delivered through agent queues,
//! whether enqueued directly or fanned out over the swarm bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::ports::errors::SyndicateError;

/// Highest (most urgent) message priority.
pub const PRIORITY_MAX: u8 = 1;
/// Lowest message priority.
pub const PRIORITY_MIN: u8 = 5;
/// Priority used when the sender did not specify one.
pub const PRIORITY_DEFAULT: u8 = 3;

/// A priority-ranked message addressed to an agent.
///
/// Lower `priority` values are more urgent; queues order strictly by
/// priority with FIFO ties. `ttl_secs` of 0 means the message never
/// expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub id: Uuid,
    pub sender: String,
    pub receiver: String,
    /// Free-form type tag, e.g. "task", "broadcast", "reply".
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// 1 (highest) ..= 5 (lowest).
    pub priority: u8,
    pub requires_response: bool,
    pub response_to: Option<Uuid>,
    #[serde(rename = "ttl")]
    pub ttl_secs: u64,
    pub metadata: Map<String, Value>,
}

impl AgentMessage {
    /// Builds a message with a fresh id, current timestamp, and defaults
    /// for the optional fields. Priority is clamped into 1..=5.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: impl Into<String>,
        payload: Map<String, Value>,
        priority: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            receiver: receiver.into(),
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
            priority: priority.clamp(PRIORITY_MAX, PRIORITY_MIN),
            requires_response: false,
            response_to: None,
            ttl_secs: 0,
            metadata: Map::new(),
        }
    }

    /// Marks the message as a reply to `original` and flips the
    /// sender/receiver pair.
    pub fn reply_to(original: &Self, kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        let mut msg = Self::new(
            original.receiver.clone(),
            original.sender.clone(),
            kind,
            payload,
            original.priority,
        );
        msg.response_to = Some(original.id);
        msg
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_requires_response(mut self, requires_response: bool) -> Self {
        self.requires_response = requires_response;
        self
    }

    /// Whether the message has outlived its TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_secs == 0 {
            return false;
        }
        let age = now.signed_duration_since(self.timestamp);
        age.num_seconds() >= 0 && age.num_seconds() as u64 >= self.ttl_secs
    }

    /// Parses a message received off the wire.
    ///
    /// Every field of the canonical shape must be present, including
    /// `response_to` (which may be null), `ttl_secs`, and `metadata`.
    /// Missing fields are a parse error, not a default.
    pub fn from_wire(value: Value) -> Result<Self, SyndicateError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SyndicateError::Serialization("message is not an object".into()))?;

        const REQUIRED: [&str; 11] = [
            "id",
            "sender",
            "receiver",
            "type",
            "payload",
            "timestamp",
            "priority",
            "requires_response",
            "response_to",
            "ttl",
            "metadata",
        ];
        for field in REQUIRED {
            if !obj.contains_key(field) {
                return Err(SyndicateError::Serialization(format!(
                    "message missing required field `{field}`"
                )));
            }
        }

        serde_json::from_value(Value::Object(obj.clone()))
            .map_err(|e| SyndicateError::Serialization(format!("malformed message: {e}")))
    }
}
