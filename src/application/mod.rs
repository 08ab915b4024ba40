//! Application layer: the composition root and the orchestration loops.

pub mod agent_loop;
pub mod health_monitor;
pub mod lifecycle;
pub mod runtime;
pub mod swarm_manager;

pub use agent_loop::{enqueue_task, execute_direct, run_agent_loop, LoopContext};
pub use health_monitor::HealthMonitor;
pub use lifecycle::{AgentPatch, AgentRegistry, LifecycleManager, LoopProbe};
pub use runtime::SyndicateRuntime;
pub use swarm_manager::SwarmManager;
