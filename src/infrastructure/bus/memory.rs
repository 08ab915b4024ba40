//! In-memory swarm bus.
//!
//! One bounded broadcast channel per topic, one delivery task per
//! subscription. Deliveries strip the wire envelope and land in the
//! subscriber's priority queue with the payload's priority (default 0),
//! so pub/sub and direct enqueue share one ordering model. The
//! envelope's source facts travel in message metadata.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::models::AgentMessage;
use crate::domain::ports::{
    envelope, payload_priority, strip_envelope, SharedAgent, SwarmBus, SyndicateResult,
};

/// In-process pub/sub fabric.
pub struct InMemoryBus {
    channel_capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Value>>>,
    /// agent id → delivery tasks, one per subscription
    subscriptions: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl InMemoryBus {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<Value> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .clone()
    }
}

impl Drop for InMemoryBus {
    fn drop(&mut self) {
        if let Ok(subscriptions) = self.subscriptions.try_lock() {
            for handles in subscriptions.values() {
                for handle in handles {
                    handle.abort();
                }
            }
        }
    }
}

#[async_trait]
impl SwarmBus for InMemoryBus {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self, agent: SharedAgent) -> SyndicateResult<()> {
        let id = agent.read().await.id.clone();
        self.subscriptions.lock().await.entry(id.clone()).or_default();
        debug!(agent_id = %id, "agent connected to in-memory bus");
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> SyndicateResult<()> {
        if let Some(handles) = self.subscriptions.lock().await.remove(agent_id) {
            for handle in handles {
                handle.abort();
            }
        }
        debug!(agent_id = %agent_id, "agent disconnected from in-memory bus");
        Ok(())
    }

    async fn publish(&self, agent_id: &str, topic: &str, payload: Value) -> SyndicateResult<bool> {
        let wrapped = envelope(&payload, agent_id, topic);
        let sender = self.sender_for(topic).await;
        match sender.send(wrapped) {
            Ok(receivers) => {
                debug!(agent_id = %agent_id, topic = %topic, receivers, "published");
                Ok(true)
            }
            Err(_) => {
                // No live subscribers on this topic
                debug!(agent_id = %agent_id, topic = %topic, "published with no subscribers");
                Ok(false)
            }
        }
    }

    async fn subscribe(&self, agent: SharedAgent, topic: &str) -> SyndicateResult<bool> {
        let agent_id = agent.read().await.id.clone();
        let mut receiver = self.sender_for(topic).await.subscribe();

        let topic_owned = topic.to_string();
        let delivery_agent = Arc::clone(&agent);
        let delivery_id = agent_id.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(delivered) => {
                        let (payload, source, source_topic) = strip_envelope(delivered);
                        let priority = payload_priority(&payload);
                        let sender = source.unwrap_or_else(|| "unknown".to_string());

                        let mut message = AgentMessage::new(
                            sender.clone(),
                            delivery_id.clone(),
                            "swarm",
                            payload,
                            priority.max(1),
                        );
                        message.priority = priority;
                        message
                            .metadata
                            .insert("_source_agent".into(), Value::from(sender));
                        if let Some(source_topic) = source_topic {
                            message
                                .metadata
                                .insert("_source_topic".into(), Value::from(source_topic));
                        }

                        let mut a = delivery_agent.write().await;
                        a.enqueue_with_priority(message, priority);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(agent_id = %delivery_id, topic = %topic_owned, skipped, "subscription lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.subscriptions
            .lock()
            .await
            .entry(agent_id.clone())
            .or_default()
            .push(handle);
        debug!(agent_id = %agent_id, topic = %topic, "subscribed");
        Ok(true)
    }
}
