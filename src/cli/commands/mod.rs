//! CLI command implementations.

pub mod alerts;
pub mod check;
pub mod servers;
pub mod summary;
pub mod watch;
