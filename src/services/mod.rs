pub mod alert_correlator;
pub mod check_orchestrator;
pub mod fleet_aggregator;
pub mod fleet_session;
pub mod fleet_sync;
pub mod lifecycle;
pub mod server_filter;

pub use alert_correlator::{AlertBadges, AlertFilter, CorrelatedAlert, ResolveOutcome, ServerRef};
pub use check_orchestrator::{
    CheckHandle, CheckOrchestrator, CheckOutcome, CheckRejection, CheckReport, CheckRun,
    CheckTimeouts,
};
pub use fleet_session::{ApplyOutcome, FleetSession, SessionEpoch};
pub use fleet_sync::{FleetRefresh, FleetSync, RetrySettings, ServerRefresh};
pub use lifecycle::LifecycleAction;
pub use server_filter::ServerFilter;
