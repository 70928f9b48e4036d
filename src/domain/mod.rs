//! Domain layer for the migration tracking core
//!
//! This module contains the fleet data model, the port traits the
//! adapters implement, and the domain error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
