//! Lifecycle evaluation.
//!
//! Pure functions over a server's status history: what its current status
//! is and which check actions an operator may start. Nothing here caches;
//! every call re-reads the history, so an appended snapshot is reflected
//! immediately.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::models::{
    CheckKind, MigrationStatus, Server, StatusSnapshot, StatusTone, UNKNOWN_SNAPSHOT,
};

/// User-triggerable actions on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    RunPrecheck,
    RunPostcheck,
}

impl LifecycleAction {
    pub fn check_kind(&self) -> CheckKind {
        match self {
            Self::RunPrecheck => CheckKind::Precheck,
            Self::RunPostcheck => CheckKind::Postcheck,
        }
    }

    pub fn for_kind(kind: CheckKind) -> Self {
        match kind {
            CheckKind::Precheck => Self::RunPrecheck,
            CheckKind::Postcheck => Self::RunPostcheck,
        }
    }
}

/// The server's current status: its last snapshot, or the unknown sentinel.
pub fn current_status(server: &Server) -> &StatusSnapshot {
    server.history.current().unwrap_or(&UNKNOWN_SNAPSHOT)
}

/// Actions legal for the server right now.
///
/// Blocked and Failed servers get nothing: they must be unblocked through
/// an external workflow before checks resume.
pub fn eligible_actions(server: &Server) -> BTreeSet<LifecycleAction> {
    let status = current_status(server);
    let mut actions = BTreeSet::new();

    match status.migration_status {
        MigrationStatus::Ready if status.precheck_status.is_startable() => {
            actions.insert(LifecycleAction::RunPrecheck);
        }
        MigrationStatus::Migrated if status.postcheck_status.is_startable() => {
            actions.insert(LifecycleAction::RunPostcheck);
        }
        _ => {}
    }

    actions
}

/// Whether a check of `kind` may be started on the server right now.
pub fn is_eligible(server: &Server, kind: CheckKind) -> bool {
    eligible_actions(server).contains(&LifecycleAction::for_kind(kind))
}

/// Badge tone for a snapshot.
pub fn status_tone(snapshot: &StatusSnapshot) -> StatusTone {
    match snapshot.migration_status {
        MigrationStatus::Completed | MigrationStatus::Ready => StatusTone::Success,
        MigrationStatus::Blocked => StatusTone::Warning,
        MigrationStatus::Failed => StatusTone::Error,
        _ => StatusTone::Info,
    }
}

/// Activity-feed wording for a snapshot.
pub fn activity_label(snapshot: &StatusSnapshot) -> String {
    match snapshot.migration_status {
        MigrationStatus::Completed => "PostCheck Completed".to_string(),
        MigrationStatus::Blocked => "PreCheck Warning".to_string(),
        MigrationStatus::Ready => "Migration Completed".to_string(),
        MigrationStatus::Failed => "PostCheck Failed".to_string(),
        other => other.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CheckStatus, ServerId, StatusHistory};

    fn server_with(snapshots: Vec<StatusSnapshot>) -> Server {
        Server::new(ServerId(1), "DEV-APP-02", "10.0.3.45", "Development")
            .with_history(StatusHistory::from_unordered(snapshots))
    }

    fn snap(m: MigrationStatus, pre: CheckStatus, post: CheckStatus) -> StatusSnapshot {
        StatusSnapshot::new(m, pre, post)
    }

    #[test]
    fn test_current_status_of_empty_history_is_unknown() {
        let server = server_with(vec![]);
        let current = current_status(&server);
        assert!(current.is_unknown());
        assert_eq!(current.migration_status, MigrationStatus::Unknown);
        assert!(eligible_actions(&server).is_empty());
    }

    #[test]
    fn test_current_status_is_last_snapshot() {
        let server = server_with(vec![
            snap(MigrationStatus::Ready, CheckStatus::NotStarted, CheckStatus::NotStarted),
            snap(MigrationStatus::Migrated, CheckStatus::Passed, CheckStatus::NotStarted),
        ]);
        assert_eq!(current_status(&server).migration_status, MigrationStatus::Migrated);
    }

    #[test]
    fn test_ready_server_may_run_precheck() {
        let server = server_with(vec![snap(
            MigrationStatus::Ready,
            CheckStatus::NotStarted,
            CheckStatus::NotApplicable,
        )]);
        let actions = eligible_actions(&server);
        assert_eq!(actions.len(), 1);
        assert!(actions.contains(&LifecycleAction::RunPrecheck));
        assert!(is_eligible(&server, CheckKind::Precheck));
        assert!(!is_eligible(&server, CheckKind::Postcheck));
    }

    #[test]
    fn test_ready_server_with_passed_precheck_has_no_actions() {
        let server = server_with(vec![snap(
            MigrationStatus::Ready,
            CheckStatus::Passed,
            CheckStatus::NotApplicable,
        )]);
        assert!(eligible_actions(&server).is_empty());
    }

    #[test]
    fn test_running_precheck_is_not_restartable() {
        let server = server_with(vec![snap(
            MigrationStatus::Ready,
            CheckStatus::Running,
            CheckStatus::NotApplicable,
        )]);
        assert!(!is_eligible(&server, CheckKind::Precheck));
    }

    #[test]
    fn test_migrated_server_may_run_postcheck() {
        let server = server_with(vec![snap(
            MigrationStatus::Migrated,
            CheckStatus::Passed,
            CheckStatus::NotApplicable,
        )]);
        assert_eq!(
            eligible_actions(&server).into_iter().collect::<Vec<_>>(),
            vec![LifecycleAction::RunPostcheck]
        );
    }

    #[test]
    fn test_blocked_and_failed_servers_have_no_actions() {
        for status in [MigrationStatus::Blocked, MigrationStatus::Failed] {
            let server = server_with(vec![snap(
                status,
                CheckStatus::NotStarted,
                CheckStatus::NotStarted,
            )]);
            assert!(eligible_actions(&server).is_empty(), "{status:?}");
        }
    }

    #[test]
    fn test_tone_and_label_mapping() {
        let completed = snap(MigrationStatus::Completed, CheckStatus::Passed, CheckStatus::Passed);
        assert_eq!(status_tone(&completed), StatusTone::Success);
        assert_eq!(activity_label(&completed), "PostCheck Completed");

        let blocked = snap(MigrationStatus::Blocked, CheckStatus::Warning, CheckStatus::NotApplicable);
        assert_eq!(status_tone(&blocked), StatusTone::Warning);

        let in_progress = snap(MigrationStatus::InProgress, CheckStatus::Passed, CheckStatus::NotStarted);
        assert_eq!(status_tone(&in_progress), StatusTone::Info);
        assert_eq!(activity_label(&in_progress), "In Progress");
    }
}
