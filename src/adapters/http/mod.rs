//! Migration backend adapter.
//!
//! Talks to the backend's REST API over HTTP. Implements [`FleetSource`]
//! and [`CheckExecutor`] on one rate-limited client.
//!
//! [`FleetSource`]: crate::domain::ports::FleetSource
//! [`CheckExecutor`]: crate::domain::ports::CheckExecutor

pub mod client;
pub mod models;

pub use client::{HttpClientConfig, MigrationApiClient};
