//! Infrastructure adapters for external systems.

pub mod http;
pub mod memory;

pub use http::{HttpClientConfig, MigrationApiClient};
pub use memory::{CheckBehavior, InMemoryFleetSource, ScriptedCheckExecutor};
