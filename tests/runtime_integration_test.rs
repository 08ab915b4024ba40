//! Integration tests for the agent runtime core: direct execution,
//! scheduled skills, queue ordering, and lifecycle legality.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use syndicate::application::agent_loop::enqueue_task;
use syndicate::domain::models::{AgentConfig, AgentKind, AgentState};
use syndicate::domain::ports::SharedAgent;
use syndicate::services::{ability, skill_fn};

use common::{test_runtime, wait_until};

/// Create → ping → stop.
#[tokio::test]
async fn create_ping_stop() {
    let (runtime, _dir) = test_runtime().await;

    let config = AgentConfig::new("pinger", AgentKind::Custom)
        .with_abilities(vec!["ping".to_string()]);
    let id = runtime.lifecycle.create(config).await.unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    let agent = runtime.lifecycle.get(&id).await.unwrap();
    let envelope = syndicate::application::agent_loop::execute_direct(
        &agent,
        &runtime.abilities,
        json!({ "ability": "ping" }),
    )
    .await
    .unwrap();

    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["queued"], json!(false));
    assert_eq!(envelope["agent_id"], json!(id));
    assert_eq!(envelope["msg"], json!("pong"));
    assert_eq!(envelope["agent_name"], json!("pinger"));
    assert_eq!(agent.read().await.task_history.len(), 1);

    runtime.lifecycle.stop(&id).await.unwrap();
    assert_eq!(runtime.lifecycle.status(&id).await.unwrap().state, AgentState::Stopped);
}

/// A skill with a one-second schedule fires roughly once per second.
#[tokio::test]
async fn scheduled_skill_fires() {
    let (runtime, _dir) = test_runtime().await;

    runtime
        .abilities
        .register_skill(
            "heartbeat",
            1,
            skill_fn(|agent: SharedAgent| async move {
                let mut a = agent.write().await;
                let beats = a.memory.get("beats").and_then(|v| v.as_i64()).unwrap_or(0);
                a.memory.set("beats", json!(beats + 1));
                Ok(())
            }),
        )
        .await;

    let config = AgentConfig::new("heart", AgentKind::Monitor)
        .with_abilities(vec!["heartbeat".to_string()]);
    let id = runtime.lifecycle.create(config).await.unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
    runtime.lifecycle.stop(&id).await.unwrap();

    let agent = runtime.lifecycle.get(&id).await.unwrap();
    let agent = agent.read().await;
    let beats = agent.memory.peek("beats").and_then(Value::as_i64).unwrap();
    assert!((3..=4).contains(&beats), "beats = {beats}");

    let state = &agent.skills["heartbeat"];
    assert!(state.xp >= 1.0, "xp = {}", state.xp);
    let last_exec = state.last_exec.expect("skill ran");
    let age = chrono::Utc::now().signed_duration_since(last_exec);
    assert!(age.num_milliseconds() < 1500, "last_exec too old: {age}");
}

/// Messages drain in priority order, FIFO on ties, observed through a
/// recording ability while the agent is paused and then resumed.
#[tokio::test]
async fn priority_queue_ordering_across_resume() {
    let (runtime, _dir) = test_runtime().await;

    runtime
        .abilities
        .register_ability(
            "record",
            ability(|agent: SharedAgent, task| async move {
                let mut a = agent.write().await;
                let mut order = a
                    .memory
                    .get("order")
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                order.push(task["id"].clone());
                a.memory.set("order", Value::Array(order));
                Ok(Value::Null)
            }),
        )
        .await;

    let config = AgentConfig::new("sorter", AgentKind::Custom)
        .with_abilities(vec!["record".to_string()]);
    let id = runtime.lifecycle.create(config).await.unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    // Let the loop reach running, then pause it
    assert!(
        wait_until(1000, || async {
            runtime.lifecycle.status(&id).await.unwrap().state == AgentState::Running
        })
        .await
    );
    runtime.lifecycle.pause(&id).await.unwrap();

    let agent = runtime.lifecycle.get(&id).await.unwrap();
    for (task_id, priority) in [("A", 3), ("B", 1), ("C", 2)] {
        enqueue_task(
            &agent,
            json!({ "ability": "record", "id": task_id, "priority": priority }),
        )
        .await
        .unwrap();
    }
    assert_eq!(agent.read().await.queue.len(), 3);

    runtime.lifecycle.resume(&id).await.unwrap();
    assert!(
        wait_until(3000, || async {
            let a = agent.read().await;
            a.memory.peek("order").and_then(Value::as_array).map(Vec::len) == Some(3)
        })
        .await
    );

    let observed = agent
        .read()
        .await
        .memory
        .peek("order")
        .cloned()
        .unwrap();
    assert_eq!(observed, json!(["B", "C", "A"]));

    runtime.lifecycle.stop(&id).await.unwrap();
}

/// Pause on a non-running agent and resume on a non-paused agent leave
/// the state untouched.
#[tokio::test]
async fn illegal_transitions_leave_state_alone() {
    let (runtime, _dir) = test_runtime().await;
    let id = runtime
        .lifecycle
        .create(AgentConfig::new("still", AgentKind::Custom))
        .await
        .unwrap();

    assert!(runtime.lifecycle.pause(&id).await.is_err());
    assert_eq!(runtime.lifecycle.status(&id).await.unwrap().state, AgentState::Created);

    assert!(runtime.lifecycle.resume(&id).await.is_err());
    assert_eq!(runtime.lifecycle.status(&id).await.unwrap().state, AgentState::Created);

    // Starting a paused agent is refused; the caller must resume
    runtime.lifecycle.start(&id).await.unwrap();
    assert!(
        wait_until(1000, || async {
            runtime.lifecycle.status(&id).await.unwrap().state == AgentState::Running
        })
        .await
    );
    runtime.lifecycle.pause(&id).await.unwrap();
    assert!(runtime.lifecycle.start(&id).await.is_err());
    assert_eq!(runtime.lifecycle.status(&id).await.unwrap().state, AgentState::Paused);

    runtime.lifecycle.resume(&id).await.unwrap();
    runtime.lifecycle.stop(&id).await.unwrap();
}

/// After stop returns, the state is terminal and the loop writes no
/// further history.
#[tokio::test]
async fn stop_reconciles_and_quiesces() {
    let (runtime, _dir) = test_runtime().await;
    let config = AgentConfig::new("quiet", AgentKind::Custom)
        .with_abilities(vec!["ping".to_string()]);
    let id = runtime.lifecycle.create(config).await.unwrap();

    // Stop before any start reconciles quietly
    runtime.lifecycle.stop(&id).await.unwrap();
    assert_eq!(runtime.lifecycle.status(&id).await.unwrap().state, AgentState::Stopped);

    runtime.lifecycle.start(&id).await.unwrap();
    runtime.lifecycle.stop(&id).await.unwrap();
    let state = runtime.lifecycle.status(&id).await.unwrap().state;
    assert!(state.is_terminal());

    let history_len = runtime.lifecycle.status(&id).await.unwrap().task_history_len;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(
        runtime.lifecycle.status(&id).await.unwrap().task_history_len,
        history_len
    );
}

/// Working memory honors the configured cap during live execution.
#[tokio::test]
async fn memory_cap_holds_under_load() {
    let (runtime, _dir) = test_runtime().await;
    let config = AgentConfig::new("bounded", AgentKind::Custom).with_memory_cap(2);
    let id = runtime.lifecycle.create(config).await.unwrap();

    runtime.lifecycle.memory_set(&id, "a", json!(1)).await.unwrap();
    runtime.lifecycle.memory_set(&id, "b", json!(2)).await.unwrap();
    runtime.lifecycle.memory_get(&id, "a").await.unwrap();
    runtime.lifecycle.memory_set(&id, "c", json!(3)).await.unwrap();

    let agent = runtime.lifecycle.get(&id).await.unwrap();
    let agent = agent.read().await;
    assert_eq!(agent.memory.len(), 2);
    let keys: Vec<&String> = agent.memory.keys_mru_first().collect();
    assert_eq!(keys, vec!["c", "a"]);
}

/// Deleting an agent stops it first and forgets its metrics.
#[tokio::test]
async fn delete_is_stop_then_remove() {
    let (runtime, _dir) = test_runtime().await;
    let id = runtime
        .lifecycle
        .create(AgentConfig::new("doomed", AgentKind::Custom))
        .await
        .unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    runtime.lifecycle.delete(&id).await.unwrap();
    assert!(runtime.lifecycle.get(&id).await.is_err());
    assert!(runtime.metrics.query(&id, None, None).is_empty());
}

/// Update merges parameters and renames without touching other config.
#[tokio::test]
async fn update_merges_parameters() {
    let (runtime, _dir) = test_runtime().await;
    let mut config = AgentConfig::new("mutable", AgentKind::Custom);
    config
        .parameters
        .insert("region".to_string(), json!("eu"));
    let id = runtime.lifecycle.create(config).await.unwrap();

    let mut parameters = serde_json::Map::new();
    parameters.insert("tier".to_string(), json!("gold"));
    let status = runtime
        .lifecycle
        .update(
            &id,
            syndicate::application::AgentPatch {
                name: Some("renamed".to_string()),
                parameters: Some(parameters),
                state: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(status.name, "renamed");

    let agent = runtime.lifecycle.get(&id).await.unwrap();
    let agent = agent.read().await;
    assert_eq!(agent.config.parameters["region"], json!("eu"));
    assert_eq!(agent.config.parameters["tier"], json!("gold"));
}

#[tokio::test]
async fn shutdown_stops_everything() {
    let (runtime, _dir) = test_runtime().await;
    let id = runtime
        .lifecycle
        .create(AgentConfig::new("worker", AgentKind::Custom))
        .await
        .unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    runtime.shutdown().await;
    let state = runtime.lifecycle.status(&id).await.unwrap().state;
    assert!(state.is_terminal());
    let _ = Arc::strong_count(&runtime);
}
