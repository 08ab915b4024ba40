//! Process-wide services: registries, metrics, persistence, the bridge
//! command bus, and the swarm optimization toolkit.

pub mod command_bus;
pub mod metrics;
pub mod persistence;
pub mod pso;
pub mod registry;
pub mod strategy;
pub mod tx_ledger;

pub use command_bus::{
    handler, CommandBus, CommandHandler, CommandRequest, CommandResponse, CommandResult,
};
pub use metrics::MetricsStore;
pub use persistence::{PersistedAgent, PersistedSkill, SnapshotStore};
pub use pso::ParticleSwarm;
pub use registry::{
    ability, register_builtins, skill_fn, AbilityFn, AbilityRegistry, AbilityResult,
    RegisteredSkill, SkillFn,
};
pub use tx_ledger::{TxLedger, TxRecord, TxStatus};
