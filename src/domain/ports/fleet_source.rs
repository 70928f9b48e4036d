//! Fleet source port: read access to the system of record.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alert, ChartSlice, DashboardCounts, Server, ServerId, TrendPoint};

/// Read-only access to servers, alerts and the backend's pre-aggregated views.
#[async_trait]
pub trait FleetSource: Send + Sync {
    /// Fetch the whole fleet with embedded status histories.
    async fn fetch_servers(&self) -> DomainResult<Vec<Server>>;

    /// Fetch one server's authoritative state.
    ///
    /// Returns `DomainError::ServerNotFound` if the backend no longer knows it.
    async fn fetch_server(&self, id: ServerId) -> DomainResult<Server>;

    /// Fetch alerts, newest first.
    async fn fetch_alerts(&self) -> DomainResult<Vec<Alert>>;

    /// Pre-aggregated dashboard counters, if the backend offers them.
    async fn fetch_dashboard_counts(&self) -> DomainResult<Option<DashboardCounts>>;

    /// Pre-aggregated check pass/fail slices, if the backend offers them.
    async fn fetch_check_breakdown(&self) -> DomainResult<Option<Vec<ChartSlice>>>;

    /// Pre-aggregated migration timeline, if the backend offers it.
    async fn fetch_timeline(&self) -> DomainResult<Option<Vec<TrendPoint>>>;
}
