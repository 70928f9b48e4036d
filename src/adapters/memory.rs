//! In-memory fleet backend for tests and offline demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Alert, ChartSlice, CheckKind, CheckStatus, DashboardCounts, MigrationStatus, Server, ServerId,
    StatusSnapshot, TrendPoint,
};
use crate::domain::ports::{CheckAck, CheckExecutor, FleetSource};

/// Fleet source backed by vectors.
///
/// Failures can be scripted with [`InMemoryFleetSource::fail_next`]; they are
/// consumed by any fetch call in order.
#[derive(Debug, Default)]
pub struct InMemoryFleetSource {
    servers: RwLock<Vec<Server>>,
    alerts: RwLock<Vec<Alert>>,
    dashboard_counts: RwLock<Option<DashboardCounts>>,
    failures: RwLock<VecDeque<DomainError>>,
    fetches: AtomicUsize,
}

impl InMemoryFleetSource {
    pub fn new(servers: Vec<Server>, alerts: Vec<Alert>) -> Self {
        Self {
            servers: RwLock::new(servers),
            alerts: RwLock::new(alerts),
            ..Default::default()
        }
    }

    /// Make the next `times` fetches fail with `error`.
    pub async fn fail_next(&self, times: usize, error: DomainError) {
        let mut failures = self.failures.write().await;
        failures.extend(std::iter::repeat_n(error, times));
    }

    /// Record a new status for a server, as the backend would after a check.
    pub async fn append_snapshot(&self, id: ServerId, snapshot: StatusSnapshot) -> DomainResult<()> {
        let mut servers = self.servers.write().await;
        let server = servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(DomainError::ServerNotFound(id))?;
        server.history.push(snapshot)
    }

    pub async fn set_alerts(&self, alerts: Vec<Alert>) {
        *self.alerts.write().await = alerts;
    }

    pub async fn set_dashboard_counts(&self, counts: Option<DashboardCounts>) {
        *self.dashboard_counts.write().await = counts;
    }

    pub async fn current(&self, id: ServerId) -> Option<StatusSnapshot> {
        let servers = self.servers.read().await;
        servers
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.history.current().cloned())
    }

    /// Number of fetch calls served, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn begin_fetch(&self) -> DomainResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.failures.write().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FleetSource for InMemoryFleetSource {
    async fn fetch_servers(&self) -> DomainResult<Vec<Server>> {
        self.begin_fetch().await?;
        Ok(self.servers.read().await.clone())
    }

    async fn fetch_server(&self, id: ServerId) -> DomainResult<Server> {
        self.begin_fetch().await?;
        self.servers
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(DomainError::ServerNotFound(id))
    }

    async fn fetch_alerts(&self) -> DomainResult<Vec<Alert>> {
        self.begin_fetch().await?;
        let mut alerts = self.alerts.read().await.clone();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn fetch_dashboard_counts(&self) -> DomainResult<Option<DashboardCounts>> {
        self.begin_fetch().await?;
        Ok(*self.dashboard_counts.read().await)
    }

    async fn fetch_check_breakdown(&self) -> DomainResult<Option<Vec<ChartSlice>>> {
        Ok(None)
    }

    async fn fetch_timeline(&self) -> DomainResult<Option<Vec<TrendPoint>>> {
        Ok(None)
    }
}

/// What a [`ScriptedCheckExecutor`] does when asked to run a check.
#[derive(Debug, Clone)]
pub enum CheckBehavior {
    /// Record a passing result after `delay`
    Pass { delay: Duration },
    /// Record `snapshot` after `delay`
    Record {
        snapshot: StatusSnapshot,
        delay: Duration,
    },
    /// Refuse to run
    Reject(String),
    /// Fail without recording anything
    Fail(DomainError),
    /// Never finish
    Hang,
}

impl Default for CheckBehavior {
    fn default() -> Self {
        Self::Pass {
            delay: Duration::ZERO,
        }
    }
}

/// Check executor that writes its results into an [`InMemoryFleetSource`].
#[derive(Debug)]
pub struct ScriptedCheckExecutor {
    source: Arc<InMemoryFleetSource>,
    default_behavior: CheckBehavior,
    overrides: RwLock<HashMap<ServerId, CheckBehavior>>,
    calls: AtomicUsize,
}

impl ScriptedCheckExecutor {
    pub fn new(source: Arc<InMemoryFleetSource>, default_behavior: CheckBehavior) -> Self {
        Self {
            source,
            default_behavior,
            overrides: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_behavior(&self, server_id: ServerId, behavior: CheckBehavior) {
        self.overrides.write().await.insert(server_id, behavior);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot a passing check of `kind` leaves behind.
    fn passed(current: Option<StatusSnapshot>, kind: CheckKind) -> StatusSnapshot {
        let current = current.unwrap_or_else(|| {
            StatusSnapshot::new(
                MigrationStatus::Unknown,
                CheckStatus::NotStarted,
                CheckStatus::NotStarted,
            )
        });
        match kind {
            CheckKind::Precheck => StatusSnapshot::new(
                current.migration_status,
                CheckStatus::Passed,
                current.postcheck_status,
            ),
            CheckKind::Postcheck => StatusSnapshot::new(
                MigrationStatus::Completed,
                current.precheck_status,
                CheckStatus::Passed,
            ),
        }
    }
}

#[async_trait]
impl CheckExecutor for ScriptedCheckExecutor {
    async fn execute(&self, server_id: ServerId, kind: CheckKind) -> DomainResult<CheckAck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .overrides
            .read()
            .await
            .get(&server_id)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());

        let (snapshot, delay) = match behavior {
            CheckBehavior::Pass { delay } => {
                (Self::passed(self.source.current(server_id).await, kind), delay)
            }
            CheckBehavior::Record { snapshot, delay } => (snapshot, delay),
            CheckBehavior::Reject(message) => return Ok(CheckAck::rejected(message)),
            CheckBehavior::Fail(err) => return Err(err),
            CheckBehavior::Hang => std::future::pending().await,
        };

        tokio::time::sleep(delay).await;
        self.source
            .append_snapshot(server_id, snapshot.recorded_at(Utc::now()))
            .await?;
        Ok(CheckAck::accepted(format!("{} completed", kind.label())))
    }
}
