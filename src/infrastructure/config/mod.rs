//! Configuration loading and the dotted-path store.

pub mod loader;
pub mod store;

pub use loader::{ConfigError, ConfigLoader};
pub use store::ConfigStore;
