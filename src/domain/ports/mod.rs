//! Capability ports for the Syndicate runtime.
//!
//! Traits the core depends on, each with a null implementation so
//! optional collaborators degrade instead of aborting.

pub mod errors;
pub mod llm_client;
pub mod market_data;
pub mod optimizer;
pub mod swarm_bus;

pub use errors::{SyndicateError, SyndicateResult};
pub use llm_client::{LlmClient, NullLlmClient};
pub use market_data::{MarketDataSource, NullMarketData};
pub use optimizer::{FitnessFn, Optimizer};
pub use swarm_bus::{
    envelope, payload_priority, scoped_topic, strip_envelope, swarm_scope, NullSwarmBus,
    SharedAgent, SwarmBus,
};
