//! migdash - server migration tracking core
//!
//! Tracks a fleet of servers through their migration lifecycle: status
//! history and eligible actions, pre-check/post-check orchestration,
//! fleet-wide aggregation and alert correlation.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): lifecycle evaluation, session state,
//!   check orchestration, aggregation and alert correlation
//! - **Adapters** (`adapters`): the backend HTTP client and an in-memory fleet
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use migdash::adapters::{CheckBehavior, InMemoryFleetSource, ScriptedCheckExecutor};
//! use migdash::services::{CheckOrchestrator, CheckTimeouts, FleetSession, FleetSync, RetrySettings};
//!
//! let source = Arc::new(InMemoryFleetSource::new(servers, alerts));
//! let sync = FleetSync::new(source.clone(), FleetSession::shared(), RetrySettings::default());
//! sync.refresh_all().await?;
//! let executor = Arc::new(ScriptedCheckExecutor::new(source, CheckBehavior::default()));
//! let orchestrator = CheckOrchestrator::new(sync, executor, CheckTimeouts::default());
//! let report = orchestrator.run_check(server_id, CheckKind::Precheck)?.wait().await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Alert, AlertId, AlertSeverity, CheckKind, CheckStatus, Config, FleetSummary, MigrationStatus,
    ReportingWindow, Server, ServerId, StatusHistory, StatusSnapshot,
};
pub use domain::ports::{CheckExecutor, FleetSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CheckOrchestrator, FleetSession, FleetSync};
