//! Health monitor: dead-loop detection, stall detection, and the
//! published status gauge.

mod common;

use std::sync::Arc;

use syndicate::application::HealthMonitor;
use syndicate::domain::models::{AgentConfig, AgentKind, AgentState, HealthStatus, MetricSummary};
use syndicate::domain::ports::SharedAgent;
use syndicate::services::skill_fn;

use common::{test_runtime, wait_until};

/// A loop killed by a panicking skill is flagged critical while the
/// state still says running.
#[tokio::test]
async fn dead_loop_is_critical() {
    let (runtime, _dir) = test_runtime().await;

    runtime
        .abilities
        .register_skill(
            "explode",
            1,
            skill_fn(|_: SharedAgent| async move {
                let crash = true;
                if crash {
                    panic!("boom");
                }
                Ok(())
            }),
        )
        .await;

    let config = AgentConfig::new("crasher", AgentKind::Custom)
        .with_abilities(vec!["explode".to_string()]);
    let id = runtime.lifecycle.create(config).await.unwrap();
    runtime.lifecycle.start(&id).await.unwrap();

    // The first scheduled firing kills the loop task
    assert!(
        wait_until(3000, || async {
            runtime
                .lifecycle
                .probe_loops()
                .await
                .iter()
                .any(|p| p.agent_id == id && p.loop_finished == Some(true))
        })
        .await
    );
    assert_eq!(
        runtime.lifecycle.status(&id).await.unwrap().state,
        AgentState::Running
    );

    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&runtime.lifecycle),
        Arc::clone(&runtime.metrics),
        runtime.config.agent.clone(),
    ));
    let checks = monitor.scan().await;
    let check = checks.iter().find(|c| c.agent_id == id).expect("checked");
    assert_eq!(check.status, HealthStatus::Critical);

    // The status gauge was published
    let summaries = runtime.metrics.query(&id, Some("health.status"), None);
    match &summaries["health.status"] {
        MetricSummary::Series { latest, .. } => {
            assert!((latest - HealthStatus::Critical.as_gauge()).abs() < f64::EPSILON);
        }
        other => panic!("unexpected summary: {other:?}"),
    }

    // Stop reconciles the crashed loop without waiting
    runtime.lifecycle.stop(&id).await.unwrap();
    assert!(runtime.lifecycle.status(&id).await.unwrap().state.is_terminal());
}

/// A live, recently-touched loop is healthy; agents without a launched
/// loop are not assessed.
#[tokio::test]
async fn live_loop_is_healthy() {
    let (runtime, _dir) = test_runtime().await;
    let running = runtime
        .lifecycle
        .create(AgentConfig::new("alive", AgentKind::Custom))
        .await
        .unwrap();
    let idle = runtime
        .lifecycle
        .create(AgentConfig::new("never-started", AgentKind::Custom))
        .await
        .unwrap();
    runtime.lifecycle.start(&running).await.unwrap();
    assert!(
        wait_until(1000, || async {
            runtime.lifecycle.status(&running).await.unwrap().state == AgentState::Running
        })
        .await
    );

    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&runtime.lifecycle),
        Arc::clone(&runtime.metrics),
        runtime.config.agent.clone(),
    ));
    let checks = monitor.scan().await;

    let check = checks.iter().find(|c| c.agent_id == running).expect("checked");
    assert_eq!(check.status, HealthStatus::Healthy);
    assert!(checks.iter().all(|c| c.agent_id != idle));

    runtime.lifecycle.stop(&running).await.unwrap();
}
