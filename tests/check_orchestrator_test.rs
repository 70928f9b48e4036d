//! Check orchestration against the in-memory backend.

mod common;

use std::time::Duration;

use common::{Harness, DEV_APP, PROD_API, PROD_DB, UAT_WEB};
use migdash::adapters::CheckBehavior;
use migdash::domain::errors::DomainError;
use migdash::domain::models::{CheckKind, CheckStatus, MigrationStatus};
use migdash::services::{lifecycle, CheckOutcome, CheckRejection, LifecycleAction};

#[tokio::test]
async fn test_precheck_scenario_reads_result_from_refetch() {
    common::setup_test_logging();
    let h = Harness::new(CheckBehavior::default()).await;
    let before = h.server(PROD_DB);
    assert_eq!(before.history.len(), 1);
    assert!(lifecycle::eligible_actions(&before).contains(&LifecycleAction::RunPrecheck));

    let report = h
        .orchestrator
        .run_check(PROD_DB, CheckKind::Precheck)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.outcome, CheckOutcome::Confirmed);
    let refreshed = report.refreshed.expect("re-fetched server");
    assert_eq!(refreshed.history.len(), 2);

    let after = h.server(PROD_DB);
    assert_eq!(after, refreshed, "session holds the re-fetched server");
    let current = lifecycle::current_status(&after);
    assert_eq!(current.migration_status, MigrationStatus::Ready);
    assert_eq!(current.precheck_status, CheckStatus::Passed);
    assert!(!lifecycle::eligible_actions(&after).contains(&LifecycleAction::RunPrecheck));
}

#[tokio::test]
async fn test_postcheck_completes_migration() {
    let h = Harness::new(CheckBehavior::default()).await;
    let report = h
        .orchestrator
        .run_check(PROD_API, CheckKind::Postcheck)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(report.outcome.is_success());
    let current = lifecycle::current_status(&h.server(PROD_API)).clone();
    assert_eq!(current.migration_status, MigrationStatus::Completed);
    assert_eq!(current.postcheck_status, CheckStatus::Passed);
    assert!(lifecycle::eligible_actions(&h.server(PROD_API)).is_empty());
}

#[tokio::test]
async fn test_second_immediate_call_is_rejected() {
    let h = Harness::new(CheckBehavior::Pass {
        delay: Duration::from_millis(30),
    })
    .await;

    let first = h.orchestrator.run_check(PROD_DB, CheckKind::Precheck);
    let second = h.orchestrator.run_check(PROD_DB, CheckKind::Precheck);

    let first = first.expect("first call accepted");
    match second {
        Err(CheckRejection::AlreadyInFlight { run_id, .. }) => assert_eq!(run_id, first.run().id),
        other => panic!("expected AlreadyInFlight, got {other:?}"),
    }

    first.wait().await.unwrap();
    assert_eq!(h.executor.calls(), 1, "exactly one execution reached the backend");
}

#[tokio::test]
async fn test_checks_on_different_servers_run_concurrently() {
    let h = Harness::new(CheckBehavior::Pass {
        delay: Duration::from_millis(20),
    })
    .await;

    let db = h.orchestrator.run_check(PROD_DB, CheckKind::Precheck).unwrap();
    let api = h.orchestrator.run_check(PROD_API, CheckKind::Postcheck).unwrap();
    assert_eq!(h.orchestrator.in_flight().len(), 2);

    let (db, api) = tokio::join!(db.wait(), api.wait());
    assert!(db.unwrap().outcome.is_success());
    assert!(api.unwrap().outcome.is_success());
    assert!(h.orchestrator.in_flight().is_empty());
}

#[tokio::test]
async fn test_blocked_and_completed_servers_are_ineligible() {
    let h = Harness::new(CheckBehavior::default()).await;
    for (id, kind) in [
        (UAT_WEB, CheckKind::Precheck),
        (UAT_WEB, CheckKind::Postcheck),
        (DEV_APP, CheckKind::Postcheck),
        (PROD_API, CheckKind::Precheck),
    ] {
        assert!(
            matches!(h.orchestrator.run_check(id, kind), Err(CheckRejection::Ineligible { .. })),
            "{kind} on {id} should be ineligible"
        );
    }
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn test_hung_executor_times_out_and_clears_marker() {
    let h = Harness::new(CheckBehavior::Hang).await;
    let handle = h.orchestrator.run_check(PROD_DB, CheckKind::Precheck).unwrap();
    let report = handle.wait().await.unwrap();

    assert!(matches!(report.outcome, CheckOutcome::TimedOut { .. }));
    assert!(!h.orchestrator.is_in_flight(PROD_DB, CheckKind::Precheck));
    // Reconciliation still ran; nothing new was recorded.
    assert_eq!(report.refreshed.map(|s| s.history.len()), Some(1));

    // The pair may be retried.
    assert!(h.orchestrator.run_check(PROD_DB, CheckKind::Precheck).is_ok());
}

#[tokio::test]
async fn test_execution_failure_is_reported_and_reconciled() {
    let h = Harness::new(CheckBehavior::Fail(DomainError::TransportFailure(
        "connection refused".into(),
    )))
    .await;

    let report = h
        .orchestrator
        .run_check(PROD_DB, CheckKind::Precheck)
        .unwrap()
        .wait()
        .await
        .unwrap();

    match &report.outcome {
        CheckOutcome::ExecutionFailed { message } => assert!(message.contains("connection refused")),
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert!(report.refreshed.is_some());
    assert!(!h.orchestrator.is_in_flight(PROD_DB, CheckKind::Precheck));
}

#[tokio::test]
async fn test_backend_rejection_is_reported() {
    let h = Harness::new(CheckBehavior::Reject("maintenance window active".into())).await;
    let report = h
        .orchestrator
        .run_check(PROD_DB, CheckKind::Precheck)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        CheckOutcome::RejectedByBackend {
            message: "maintenance window active".into()
        }
    );
    assert_eq!(h.server(PROD_DB).history.len(), 1);
}

#[tokio::test]
async fn test_failed_refetch_is_reported_without_touching_session() {
    let h = Harness::new(CheckBehavior::default()).await;
    h.source
        .fail_next(1, DomainError::SerializationError("truncated body".into()))
        .await;

    let report = h
        .orchestrator
        .run_check(PROD_DB, CheckKind::Precheck)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(matches!(report.outcome, CheckOutcome::RefreshFailed { .. }));
    assert!(report.refreshed.is_none());
    assert_eq!(h.server(PROD_DB).history.len(), 1, "displayed status unchanged");
    assert_eq!(h.source.current(PROD_DB).await.unwrap().precheck_status, CheckStatus::Passed);
}

#[tokio::test]
async fn test_invalidated_session_detaches_run() {
    let h = Harness::new(CheckBehavior::Pass {
        delay: Duration::from_millis(30),
    })
    .await;

    let handle = h.orchestrator.run_check(PROD_DB, CheckKind::Precheck).unwrap();
    h.session().invalidate();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.outcome, CheckOutcome::Detached);
    assert!(report.refreshed.is_none());
    assert!(h.session().servers().is_empty(), "no late write into the reset session");
    assert!(!h.orchestrator.is_in_flight(PROD_DB, CheckKind::Precheck));
}

#[tokio::test]
async fn test_subscribers_receive_each_report() {
    let h = Harness::new(CheckBehavior::default()).await;
    let mut reports = h.orchestrator.subscribe();

    let direct = h
        .orchestrator
        .run_check(PROD_DB, CheckKind::Precheck)
        .unwrap()
        .wait()
        .await
        .unwrap();
    let published = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .expect("report published")
        .unwrap();

    assert_eq!(published, direct);
}

#[tokio::test]
async fn test_dropped_handle_does_not_cancel_run() {
    let h = Harness::new(CheckBehavior::Pass {
        delay: Duration::from_millis(10),
    })
    .await;
    let mut reports = h.orchestrator.subscribe();

    drop(h.orchestrator.run_check(PROD_DB, CheckKind::Precheck).unwrap());
    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .expect("run finished")
        .unwrap();

    assert!(report.outcome.is_success());
    assert_eq!(h.server(PROD_DB).history.len(), 2);
}
