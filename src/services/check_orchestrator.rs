//! Check orchestration.
//!
//! Starts pre-checks and post-checks, guarantees at most one run per
//! (server, check kind), and always reconciles with the system of record
//! once a run ends, whatever the way it ended. The displayed status after a
//! check comes only from that re-fetch, never from the execution result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CheckConfig, CheckKind, CheckStatus, MigrationStatus, Server, ServerId};
use crate::domain::ports::CheckExecutor;
use crate::services::fleet_session::{ApplyOutcome, SessionEpoch};
use crate::services::fleet_sync::FleetSync;
use crate::services::lifecycle;

const REPORT_CHANNEL_CAPACITY: usize = 64;

/// Time bounds for a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTimeouts {
    /// How long to wait for the executor to confirm completion
    pub confirm: Duration,
    /// How long the post-run re-fetch may take, retries included
    pub refresh: Duration,
}

impl Default for CheckTimeouts {
    fn default() -> Self {
        Self::from(&CheckConfig::default())
    }
}

impl From<&CheckConfig> for CheckTimeouts {
    fn from(config: &CheckConfig) -> Self {
        Self {
            confirm: Duration::from_secs(config.confirm_timeout_secs),
            refresh: Duration::from_secs(config.refresh_timeout_secs),
        }
    }
}

/// A check that has been started and not yet reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRun {
    pub id: Uuid,
    pub server_id: ServerId,
    pub kind: CheckKind,
    pub started_at: DateTime<Utc>,
}

impl CheckRun {
    fn new(server_id: ServerId, kind: CheckKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id,
            kind,
            started_at: Utc::now(),
        }
    }
}

/// Why a check was not started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckRejection {
    #[error("a {kind} is already running on server {server_id} (run {run_id})")]
    AlreadyInFlight {
        server_id: ServerId,
        kind: CheckKind,
        run_id: Uuid,
    },

    #[error("server {server_id} is not eligible for a {kind}: migration {migration_status:?}, check {check_status:?}")]
    Ineligible {
        server_id: ServerId,
        kind: CheckKind,
        migration_status: MigrationStatus,
        check_status: CheckStatus,
    },

    #[error("server {0} is not part of the fleet")]
    UnknownServer(ServerId),
}

impl From<CheckRejection> for DomainError {
    fn from(rejection: CheckRejection) -> Self {
        match rejection {
            CheckRejection::UnknownServer(id) => DomainError::ServerNotFound(id),
            other => DomainError::ValidationRejected(other.to_string()),
        }
    }
}

/// How a check run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The executor finished and the server was re-fetched
    Confirmed,
    /// The backend refused to run the check
    RejectedByBackend { message: String },
    /// The execution call failed
    ExecutionFailed { message: String },
    /// No confirmation arrived within the confirm timeout
    TimedOut { after: Duration },
    /// The execution finished but the re-fetch did not
    RefreshFailed { message: String },
    /// The session that started the run has been invalidated
    Detached,
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Published once per run, after the re-fetch has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub run: CheckRun,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    /// Authoritative server state after the run, when it could be read
    pub refreshed: Option<Server>,
}

/// Handle to a started check.
///
/// Dropping it does not cancel the run.
#[derive(Debug)]
pub struct CheckHandle {
    run: CheckRun,
    report: oneshot::Receiver<CheckReport>,
}

impl CheckHandle {
    pub fn run(&self) -> &CheckRun {
        &self.run
    }

    /// Wait for the run to be reconciled.
    pub async fn wait(self) -> DomainResult<CheckReport> {
        self.report.await.map_err(|_| {
            DomainError::DataInconsistency(format!(
                "check run {} ended without a report",
                self.run.id
            ))
        })
    }
}

type RunKey = (ServerId, CheckKind);

struct Inner {
    sync: FleetSync,
    executor: Arc<dyn CheckExecutor>,
    timeouts: CheckTimeouts,
    in_flight: Mutex<HashMap<RunKey, CheckRun>>,
    reports: broadcast::Sender<CheckReport>,
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<RunKey, CheckRun>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(&self, run: &CheckRun) -> CheckOutcome {
        let confirm = tokio::time::timeout(
            self.timeouts.confirm,
            self.executor.execute(run.server_id, run.kind),
        )
        .await;

        match confirm {
            Ok(Ok(ack)) if ack.accepted => CheckOutcome::Confirmed,
            Ok(Ok(ack)) => {
                warn!(run_id = %run.id, message = %ack.message, "backend rejected check");
                CheckOutcome::RejectedByBackend {
                    message: ack.message,
                }
            }
            Ok(Err(err)) => {
                warn!(run_id = %run.id, error = %err, "check execution failed");
                CheckOutcome::ExecutionFailed {
                    message: err.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    run_id = %run.id,
                    timeout_ms = self.timeouts.confirm.as_millis(),
                    "check confirmation timed out"
                );
                CheckOutcome::TimedOut {
                    after: self.timeouts.confirm,
                }
            }
        }
    }

    async fn reconcile(&self, run: &CheckRun, epoch: SessionEpoch, execution: CheckOutcome) -> (CheckOutcome, Option<Server>) {
        let session = self.sync.session();
        if !session.is_live(epoch) {
            return (CheckOutcome::Detached, None);
        }

        let refresh = tokio::time::timeout(
            self.timeouts.refresh,
            self.sync.refresh_server(epoch, run.server_id),
        )
        .await;

        let failure = match refresh {
            Ok(Ok(refresh)) => {
                return match refresh.outcome {
                    ApplyOutcome::Detached => (CheckOutcome::Detached, None),
                    // The session already holds something newer; show that.
                    ApplyOutcome::Stale => (execution, session.server(run.server_id)),
                    ApplyOutcome::Applied | ApplyOutcome::Inserted => {
                        (execution, Some(refresh.server))
                    }
                };
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => DomainError::Timeout(
                u64::try_from(self.timeouts.refresh.as_millis()).unwrap_or(u64::MAX),
            )
            .to_string(),
        };

        warn!(run_id = %run.id, server_id = %run.server_id, error = %failure, "post-check re-fetch failed");
        let outcome = match execution {
            CheckOutcome::Confirmed => CheckOutcome::RefreshFailed { message: failure },
            other => other,
        };
        (outcome, None)
    }
}

/// Clears the in-flight marker on every exit path of a run.
struct InFlightGuard {
    inner: Arc<Inner>,
    key: RunKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight().remove(&self.key);
    }
}

/// Starts checks and reconciles their results with the fleet session.
#[derive(Clone)]
pub struct CheckOrchestrator {
    inner: Arc<Inner>,
}

impl CheckOrchestrator {
    pub fn new(sync: FleetSync, executor: Arc<dyn CheckExecutor>, timeouts: CheckTimeouts) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                sync,
                executor,
                timeouts,
                in_flight: Mutex::new(HashMap::new()),
                reports,
            }),
        }
    }

    /// Start a check on a server.
    ///
    /// Validation and reservation happen synchronously: a second call for
    /// the same (server, kind) while the first is unresolved is rejected
    /// before this returns. Must be called from within a tokio runtime.
    pub fn run_check(&self, server_id: ServerId, kind: CheckKind) -> Result<CheckHandle, CheckRejection> {
        let session = self.inner.sync.session();
        let epoch = session.epoch();
        let key = (server_id, kind);

        let run = {
            let mut in_flight = self.inner.in_flight();
            if let Some(existing) = in_flight.get(&key) {
                return Err(CheckRejection::AlreadyInFlight {
                    server_id,
                    kind,
                    run_id: existing.id,
                });
            }

            let server = session
                .server(server_id)
                .ok_or(CheckRejection::UnknownServer(server_id))?;
            if !lifecycle::is_eligible(&server, kind) {
                let current = lifecycle::current_status(&server);
                return Err(CheckRejection::Ineligible {
                    server_id,
                    kind,
                    migration_status: current.migration_status,
                    check_status: current.check_status(kind),
                });
            }

            let run = CheckRun::new(server_id, kind);
            in_flight.insert(key, run.clone());
            run
        };

        info!(run_id = %run.id, server_id = %server_id, kind = %kind, "check started");

        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            key,
        };
        let (report_tx, report_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let task_run = run.clone();

        tokio::spawn(async move {
            let execution = inner.execute(&task_run).await;
            let (outcome, refreshed) = inner.reconcile(&task_run, epoch, execution).await;
            drop(guard);

            let report = CheckReport {
                run: task_run,
                finished_at: Utc::now(),
                outcome,
                refreshed,
            };
            info!(
                run_id = %report.run.id,
                server_id = %report.run.server_id,
                outcome = ?report.outcome,
                "check finished"
            );
            // Nobody listening is fine.
            let _ = inner.reports.send(report.clone());
            let _ = report_tx.send(report);
        });

        Ok(CheckHandle {
            run,
            report: report_rx,
        })
    }

    /// Every report published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckReport> {
        self.inner.reports.subscribe()
    }

    /// Runs started and not yet reconciled.
    pub fn in_flight(&self) -> Vec<CheckRun> {
        let mut runs: Vec<CheckRun> = self.inner.in_flight().values().cloned().collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    pub fn is_in_flight(&self, server_id: ServerId, kind: CheckKind) -> bool {
        self.inner.in_flight().contains_key(&(server_id, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{CheckBehavior, InMemoryFleetSource, ScriptedCheckExecutor};
    use crate::domain::models::{StatusHistory, StatusSnapshot};
    use crate::services::fleet_session::FleetSession;
    use crate::services::fleet_sync::RetrySettings;

    async fn orchestrator(
        status: MigrationStatus,
        behavior: CheckBehavior,
    ) -> (CheckOrchestrator, Arc<ScriptedCheckExecutor>) {
        let server = Server::new(ServerId(1), "DEV-APP-02", "10.0.3.45", "Development").with_history(
            StatusHistory::from_unordered(vec![StatusSnapshot::new(
                status,
                CheckStatus::NotStarted,
                CheckStatus::NotApplicable,
            )
            .recorded_at(Utc::now() - chrono::Duration::minutes(5))]),
        );
        let source = Arc::new(InMemoryFleetSource::new(vec![server], vec![]));
        let executor = Arc::new(ScriptedCheckExecutor::new(Arc::clone(&source), behavior));
        let sync = FleetSync::new(source, FleetSession::shared(), RetrySettings::default());
        sync.refresh_all().await.unwrap();
        let orchestrator = CheckOrchestrator::new(sync, executor.clone(), CheckTimeouts::default());
        (orchestrator, executor)
    }

    #[tokio::test]
    async fn test_rejects_unknown_server() {
        let (orch, _) = orchestrator(MigrationStatus::Ready, CheckBehavior::default()).await;
        assert_eq!(
            orch.run_check(ServerId(9), CheckKind::Precheck).unwrap_err(),
            CheckRejection::UnknownServer(ServerId(9))
        );
    }

    #[tokio::test]
    async fn test_rejects_ineligible_kind() {
        let (orch, executor) = orchestrator(MigrationStatus::Ready, CheckBehavior::default()).await;
        let err = orch.run_check(ServerId(1), CheckKind::Postcheck).unwrap_err();
        assert!(matches!(err, CheckRejection::Ineligible { kind: CheckKind::Postcheck, .. }));
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_marker_cleared_after_report() {
        let (orch, _) = orchestrator(MigrationStatus::Ready, CheckBehavior::default()).await;
        let handle = orch.run_check(ServerId(1), CheckKind::Precheck).unwrap();
        assert!(orch.is_in_flight(ServerId(1), CheckKind::Precheck));

        let report = handle.wait().await.unwrap();
        assert!(report.outcome.is_success());
        assert!(!orch.is_in_flight(ServerId(1), CheckKind::Precheck));
        assert!(orch.in_flight().is_empty());
    }

    #[test]
    fn test_rejection_maps_to_domain_error() {
        let err: DomainError = CheckRejection::UnknownServer(ServerId(4)).into();
        assert!(matches!(err, DomainError::ServerNotFound(ServerId(4))));
    }
}
