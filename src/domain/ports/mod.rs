//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - FleetSource: read access to servers, alerts and pre-aggregated views
//! - CheckExecutor: triggering pre-checks and post-checks
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod check_executor;
pub mod fleet_source;

pub use check_executor::{CheckAck, CheckExecutor};
pub use fleet_source::FleetSource;
