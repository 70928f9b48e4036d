//! Common test utilities for integration tests
//!
//! A small fleet of four servers and four alerts, plus helpers that wire an
//! in-memory backend to a fleet session and a check orchestrator.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use migdash::adapters::{CheckBehavior, InMemoryFleetSource, ScriptedCheckExecutor};
use migdash::domain::models::{
    Alert, AlertId, AlertSeverity, CheckStatus, MigrationStatus, Server, ServerId, StatusHistory,
    StatusSnapshot,
};
use migdash::services::{CheckOrchestrator, CheckTimeouts, FleetSession, FleetSync, RetrySettings};

pub const PROD_DB: ServerId = ServerId(1);
pub const PROD_API: ServerId = ServerId(2);
pub const UAT_WEB: ServerId = ServerId(3);
pub const DEV_APP: ServerId = ServerId(4);

/// Setup test logging
///
/// Call this at the beginning of tests that need log output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

pub fn snapshot(
    migration: MigrationStatus,
    precheck: CheckStatus,
    postcheck: CheckStatus,
    at: DateTime<Utc>,
) -> StatusSnapshot {
    StatusSnapshot::new(migration, precheck, postcheck).recorded_at(at)
}

/// Four servers, one per interesting lifecycle position:
///
/// - PROD-DB-01: Ready, pre-check not started
/// - PROD-API-01: Migrated after a passed pre-check, post-check not started
/// - UAT-WEB-03: Blocked by a failed pre-check
/// - DEV-APP-02: Completed yesterday
pub fn fleet() -> Vec<Server> {
    vec![
        Server::new(PROD_DB, "PROD-DB-01", "10.0.1.20", "Production").with_history(
            StatusHistory::from_unordered(vec![snapshot(
                MigrationStatus::Ready,
                CheckStatus::NotStarted,
                CheckStatus::NotApplicable,
                days_ago(3),
            )]),
        ),
        Server::new(PROD_API, "PROD-API-01", "10.0.1.5", "Production")
            .with_owner("Platform")
            .with_history(StatusHistory::from_unordered(vec![
                snapshot(MigrationStatus::Ready, CheckStatus::NotStarted, CheckStatus::NotApplicable, days_ago(6)),
                snapshot(MigrationStatus::Ready, CheckStatus::Passed, CheckStatus::NotApplicable, days_ago(5)),
                snapshot(MigrationStatus::Migrated, CheckStatus::Passed, CheckStatus::NotStarted, days_ago(2)),
            ])),
        Server::new(UAT_WEB, "UAT-WEB-03", "10.0.2.31", "UAT").with_history(
            StatusHistory::from_unordered(vec![snapshot(
                MigrationStatus::Blocked,
                CheckStatus::Failed,
                CheckStatus::NotApplicable,
                days_ago(1),
            )
            .with_issue("Port 443 unreachable from target subnet")]),
        ),
        Server::new(DEV_APP, "DEV-APP-02", "10.0.3.12", "Development").with_history(
            StatusHistory::from_unordered(vec![
                snapshot(MigrationStatus::Migrated, CheckStatus::Passed, CheckStatus::NotStarted, days_ago(2)),
                snapshot(MigrationStatus::Completed, CheckStatus::Passed, CheckStatus::Passed, days_ago(1)),
            ]),
        ),
    ]
}

/// Four alerts. Only the first one is tied to a server whose name contains
/// "prod" and is still unresolved.
pub fn alerts() -> Vec<Alert> {
    vec![
        Alert::new(
            AlertId(1),
            AlertSeverity::High,
            "Response latency above 2s since cutover",
            days_ago(1),
        )
        .for_server(PROD_API)
        .with_title("Latency regression"),
        {
            let mut alert = Alert::new(
                AlertId(2),
                AlertSeverity::Medium,
                "Backup job missed its window",
                days_ago(4),
            )
            .for_server(PROD_DB)
            .with_title("Backup missed");
            alert.mark_resolved(Some("Re-run succeeded".into()));
            alert
        },
        Alert::new(
            AlertId(3),
            AlertSeverity::High,
            "Port 443 unreachable from target subnet",
            days_ago(1),
        )
        .for_server(UAT_WEB)
        .with_title("Connectivity"),
        Alert::new(
            AlertId(4),
            AlertSeverity::Low,
            "Firewall change window scheduled",
            days_ago(2),
        )
        .with_team("Network"),
    ]
}

pub fn fast_retry() -> RetrySettings {
    RetrySettings {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        max_elapsed: Duration::from_millis(200),
    }
}

pub fn fast_timeouts() -> CheckTimeouts {
    CheckTimeouts {
        confirm: Duration::from_millis(100),
        refresh: Duration::from_secs(2),
    }
}

/// In-memory backend, a loaded session and an orchestrator over both.
pub struct Harness {
    pub source: Arc<InMemoryFleetSource>,
    pub executor: Arc<ScriptedCheckExecutor>,
    pub sync: FleetSync,
    pub orchestrator: CheckOrchestrator,
}

impl Harness {
    pub async fn new(behavior: CheckBehavior) -> Self {
        let source = Arc::new(InMemoryFleetSource::new(fleet(), alerts()));
        let executor = Arc::new(ScriptedCheckExecutor::new(Arc::clone(&source), behavior));
        let sync = FleetSync::new(source.clone(), FleetSession::shared(), fast_retry());
        sync.refresh_all().await.expect("initial fleet load");
        let orchestrator = CheckOrchestrator::new(sync.clone(), executor.clone(), fast_timeouts());
        Self {
            source,
            executor,
            sync,
            orchestrator,
        }
    }

    pub fn session(&self) -> &Arc<FleetSession> {
        self.sync.session()
    }

    pub fn server(&self, id: ServerId) -> Server {
        self.session().server(id).expect("server in session")
    }
}
