//! The per-agent cooperative loop.
//!
//! One tokio task per live agent: fire due skills, drain the priority
//! queue one message per iteration, sleep when idle. The loop never
//! unwinds on application errors; skill and ability failures are
//! absorbed into XP bookkeeping and logs. Lifecycle stops are
//! cooperative: the manager flips the state and the loop observes it at
//! most one iteration later.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::models::{
    AgentMessage, AgentState, AgentTuning, MetricType, PRIORITY_DEFAULT,
};
use crate::domain::ports::{SharedAgent, SyndicateError, SyndicateResult};
use crate::services::{AbilityRegistry, MetricsStore};
use std::sync::Arc;

/// Shared collaborators the loop needs.
#[derive(Clone)]
pub struct LoopContext {
    pub abilities: Arc<AbilityRegistry>,
    pub metrics: Arc<MetricsStore>,
    pub tuning: AgentTuning,
}

/// Runs one agent's loop to completion.
///
/// Exits when the state becomes stopped or error. Finalization: a loop
/// that exits for any other reason reconciles the state to stopped.
pub async fn run_agent_loop(agent: SharedAgent, context: LoopContext) {
    let (agent_id, agent_name, wakeup) = {
        let a = agent.read().await;
        (a.id.clone(), a.name.clone(), Arc::clone(&a.wakeup))
    };
    info!(agent_id = %agent_id, name = %agent_name, "agent loop started");

    loop {
        let state = agent.read().await.state;
        if state.is_terminal() {
            break;
        }
        if state == AgentState::Paused {
            tokio::time::sleep(Duration::from_millis(context.tuning.paused_sleep_ms)).await;
            continue;
        }

        let mut did_work = false;

        // Scheduled skills: decay first, then fire whatever is due
        let due = decay_and_collect_due(&agent, context.tuning.xp_decay_rate).await;
        for skill_name in due {
            did_work = true;
            run_skill(&agent, &agent_id, &skill_name, &context).await;
        }

        // One queued message per iteration
        if let Some(message) = next_message(&agent).await {
            did_work = true;
            handle_message(&agent, &agent_id, message, &context).await;
        }

        {
            let mut a = agent.write().await;
            a.touch();
            let queue_len = a.queue.len();
            drop(a);
            context
                .metrics
                .record_gauge(&agent_id, "loop.queue_len", queue_len as f64);
        }

        if did_work {
            tokio::task::yield_now().await;
        } else {
            // Sleep only until the next scheduled skill could fire, and
            // wake early when something lands in the queue
            let bound = next_due_bound(&agent, context.tuning.default_sleep_ms).await;
            tokio::select! {
                () = tokio::time::sleep(bound) => {}
                () = wakeup.notified() => {}
            }
        }
    }

    // Finalize
    {
        let mut a = agent.write().await;
        if !a.state.is_terminal() {
            a.set_state(AgentState::Stopped);
        }
    }
    info!(agent_id = %agent_id, name = %agent_name, "agent loop finished");
}

/// Idle sleep bound: the time until the next scheduled skill is due,
/// capped at the configured idle sleep.
async fn next_due_bound(agent: &SharedAgent, default_sleep_ms: u64) -> Duration {
    let now = Utc::now();
    let a = agent.read().await;
    let mut bound = default_sleep_ms;
    for state in a.skills.values() {
        if state.skill.schedule_secs == 0 {
            continue;
        }
        let remaining_ms = match state.last_exec {
            None => 0,
            Some(last) => {
                let due_at = last + chrono::Duration::seconds(state.skill.schedule_secs as i64);
                due_at.signed_duration_since(now).num_milliseconds().max(0) as u64
            }
        };
        bound = bound.min(remaining_ms);
    }
    // A zero bound still yields the scheduler
    Duration::from_millis(bound.max(1))
}

/// Applies XP decay to every skill and returns the names due to fire.
async fn decay_and_collect_due(agent: &SharedAgent, decay: f64) -> Vec<String> {
    let now = Utc::now();
    let mut a = agent.write().await;
    let mut due = Vec::new();
    for (name, state) in &mut a.skills {
        state.decay(decay);
        if state.skill.is_due(state.last_exec, now) {
            due.push(name.clone());
        }
    }
    due
}

async fn run_skill(agent: &SharedAgent, agent_id: &str, skill_name: &str, context: &LoopContext) {
    let Some(registered) = context.abilities.get_skill(skill_name).await else {
        // Registry shrank underneath us; drop the stale table entry
        warn!(agent_id = %agent_id, skill = %skill_name, "skill vanished from registry");
        agent.write().await.skills.remove(skill_name);
        return;
    };

    let outcome = (registered.callable)(Arc::clone(agent)).await;
    let now = Utc::now();
    let mut a = agent.write().await;
    let Some(state) = a.skills.get_mut(skill_name) else {
        return;
    };
    match outcome {
        Ok(()) => {
            state.record_success(now);
            debug!(agent_id = %agent_id, skill = %skill_name, xp = state.xp, "skill fired");
        }
        Err(e) => {
            state.record_failure(now);
            warn!(agent_id = %agent_id, skill = %skill_name, error = %e, "skill failed");
            drop(a);
            context.metrics.record(
                agent_id,
                "loop.skill_failures",
                Value::from(1.0),
                MetricType::Counter,
                std::collections::HashMap::from([("skill".to_string(), skill_name.to_string())]),
            );
        }
    }
}

/// Purges expired messages and pops the most urgent survivor.
async fn next_message(agent: &SharedAgent) -> Option<AgentMessage> {
    let now = Utc::now();
    let mut a = agent.write().await;
    let expired = a.queue.remove_matching(|m| m.is_expired(now));
    for message in &expired {
        debug!(message_id = %message.id, "expired message dropped");
    }
    a.queue.dequeue()
}

/// Dispatches one message: messages bearing an `ability` field invoke
/// it; unknown abilities are logged and dropped.
async fn handle_message(
    agent: &SharedAgent,
    agent_id: &str,
    message: AgentMessage,
    context: &LoopContext,
) {
    let Some(ability_name) = message
        .payload
        .get("ability")
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        debug!(agent_id = %agent_id, message_id = %message.id, kind = %message.kind, "message without ability, dropped");
        return;
    };

    let Some(ability) = context.abilities.get_ability(&ability_name).await else {
        warn!(agent_id = %agent_id, ability = %ability_name, "unknown ability in message, dropped");
        return;
    };

    let task = Value::Object(message.payload.clone());
    match ability(Arc::clone(agent), task).await {
        Ok(_) => {
            debug!(agent_id = %agent_id, ability = %ability_name, message_id = %message.id, "message handled");
        }
        Err(e) => {
            warn!(agent_id = %agent_id, ability = %ability_name, error = %e, "message handling failed");
        }
    }
}

// ========================
// Task execution (bridge-facing)
// ========================

/// Queue-mode execution: enqueue and return immediately.
pub async fn enqueue_task(agent: &SharedAgent, task: Value) -> SyndicateResult<Value> {
    let payload = match task {
        Value::Object(map) => map,
        _ => return Err(SyndicateError::InvalidTask("task must be an object".into())),
    };
    let priority = payload
        .get("priority")
        .and_then(Value::as_u64)
        .map_or(PRIORITY_DEFAULT, |p| u8::try_from(p).unwrap_or(u8::MAX));

    let mut a = agent.write().await;
    let message = AgentMessage::new("external", a.id.clone(), "task", payload, priority);
    let message_id = message.id;
    a.enqueue(message);
    Ok(json!({
        "success": true,
        "queued": true,
        "message_id": message_id,
    }))
}

/// Direct execution: invoke the named ability synchronously, append a
/// task-history record, and return the ability's result merged with a
/// success envelope. Ability failures come back as an error envelope;
/// a missing or unknown ability is a validation error instead.
pub async fn execute_direct(
    agent: &SharedAgent,
    abilities: &AbilityRegistry,
    task: Value,
) -> SyndicateResult<Value> {
    let ability_name = task
        .get("ability")
        .and_then(Value::as_str)
        .ok_or_else(|| SyndicateError::InvalidTask("task requires an `ability` field".into()))?
        .to_string();

    let ability = abilities
        .get_ability(&ability_name)
        .await
        .ok_or_else(|| SyndicateError::AbilityNotFound(ability_name.clone()))?;

    let agent_id = agent.read().await.id.clone();
    let outcome = ability(Arc::clone(agent), task.clone()).await;

    let envelope = match outcome {
        Ok(result) => {
            let mut map = match result {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    let mut m = Map::new();
                    m.insert("result".into(), other);
                    m
                }
            };
            map.insert("success".into(), Value::Bool(true));
            map.insert("queued".into(), Value::Bool(false));
            map.entry("agent_id".to_string())
                .or_insert_with(|| Value::from(agent_id.clone()));
            Value::Object(map)
        }
        Err(e) => json!({
            "success": false,
            "queued": false,
            "agent_id": agent_id,
            "error": e.to_string(),
        }),
    };

    {
        let mut a = agent.write().await;
        a.record_task(task, envelope.clone());
    }
    Ok(envelope)
}
