//! Server and status history domain model.
//!
//! A server carries an append-only history of status snapshots. The last
//! snapshot is the server's current status; an empty history means every
//! status field is unknown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Identifier of a server in the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub i64);

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse lifecycle stage of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotStarted,
    Ready,
    InProgress,
    Migrated,
    Blocked,
    Completed,
    Failed,
    /// No recorded status, or a value the core does not recognise
    Unknown,
}

impl MigrationStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 8] = [
        Self::NotStarted,
        Self::Ready,
        Self::InProgress,
        Self::Migrated,
        Self::Blocked,
        Self::Completed,
        Self::Failed,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Migrated => "migrated",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Human label, as the backend spells it.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Ready => "Ready",
            Self::InProgress => "In Progress",
            Self::Migrated => "Migrated",
            Self::Blocked => "Blocked",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        match normalized.as_str() {
            "notstarted" => Some(Self::NotStarted),
            "ready" => Some(Self::Ready),
            "inprogress" | "running" => Some(Self::InProgress),
            "migrated" => Some(Self::Migrated),
            "blocked" => Some(Self::Blocked),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Terminal statuses only change through an explicit new action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome state of a pre-check or post-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    NotStarted,
    /// The backend is executing the check right now
    Running,
    Passed,
    Warning,
    Failed,
    NotApplicable,
    Unknown,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Warning => "warning",
            Self::Failed => "failed",
            Self::NotApplicable => "not_applicable",
            Self::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Running => "Running",
            Self::Passed => "Passed",
            Self::Warning => "Warning",
            Self::Failed => "Failed",
            Self::NotApplicable => "N/A",
            Self::Unknown => "Unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        match normalized.as_str() {
            "" | "notstarted" | "none" | "pending" => Some(Self::NotStarted),
            "running" | "inprogress" => Some(Self::Running),
            "passed" | "pass" => Some(Self::Passed),
            "warning" | "warn" => Some(Self::Warning),
            "failed" | "fail" => Some(Self::Failed),
            "n/a" | "na" | "notapplicable" => Some(Self::NotApplicable),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// A check in this state may be started.
    pub fn is_startable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::NotApplicable)
    }

    /// The check has produced a verdict.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Passed | Self::Warning | Self::Failed)
    }
}

/// Which check a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Precheck,
    Postcheck,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precheck => "precheck",
            Self::Postcheck => "postcheck",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Precheck => "PreCheck",
            Self::Postcheck => "PostCheck",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "precheck" | "pre" => Some(Self::Precheck),
            "postcheck" | "post" => Some(Self::Postcheck),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded observation of a server's statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub migration_status: MigrationStatus,
    pub precheck_status: CheckStatus,
    pub postcheck_status: CheckStatus,
    #[serde(default)]
    pub issue_summary: String,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Sentinel returned for servers without any recorded status.
pub static UNKNOWN_SNAPSHOT: StatusSnapshot = StatusSnapshot {
    migration_status: MigrationStatus::Unknown,
    precheck_status: CheckStatus::Unknown,
    postcheck_status: CheckStatus::Unknown,
    issue_summary: String::new(),
    recorded_at: None,
};

impl StatusSnapshot {
    pub fn new(
        migration_status: MigrationStatus,
        precheck_status: CheckStatus,
        postcheck_status: CheckStatus,
    ) -> Self {
        Self {
            migration_status,
            precheck_status,
            postcheck_status,
            issue_summary: String::new(),
            recorded_at: None,
        }
    }

    pub fn with_issue(mut self, issue_summary: impl Into<String>) -> Self {
        self.issue_summary = issue_summary.into();
        self
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// Status of the given check.
    pub fn check_status(&self, kind: CheckKind) -> CheckStatus {
        match kind {
            CheckKind::Precheck => self.precheck_status,
            CheckKind::Postcheck => self.postcheck_status,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.migration_status == MigrationStatus::Unknown && self.recorded_at.is_none()
    }
}

/// Append-only, time-ordered sequence of status snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusSnapshot>);

impl StatusHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a history from snapshots in arbitrary order.
    ///
    /// Sorting is stable; snapshots without a timestamp sort first.
    pub fn from_unordered(mut snapshots: Vec<StatusSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.recorded_at);
        Self(snapshots)
    }

    /// Build a history whose current snapshot is known independently of
    /// timestamps. `earlier` is ordered as in [`Self::from_unordered`] and
    /// `current` is always placed last, even when it is untimestamped or
    /// older than an earlier row. Rebuilding such a history with
    /// `from_unordered` can therefore change which snapshot is current.
    pub fn with_current(earlier: Vec<StatusSnapshot>, current: StatusSnapshot) -> Self {
        let mut history = Self::from_unordered(earlier);
        history.0.push(current);
        history
    }

    /// Append a snapshot. It may not be older than the current last one,
    /// and an untimestamped snapshot can only join an untimestamped history.
    pub fn push(&mut self, snapshot: StatusSnapshot) -> DomainResult<()> {
        match (self.last_recorded_at(), snapshot.recorded_at) {
            (Some(last), Some(at)) if at < last => {
                return Err(DomainError::ValidationRejected(format!(
                    "snapshot recorded at {at} is older than current status at {last}"
                )));
            }
            (Some(last), None) => {
                return Err(DomainError::ValidationRejected(format!(
                    "untimestamped snapshot cannot follow status recorded at {last}"
                )));
            }
            _ => {}
        }
        self.0.push(snapshot);
        Ok(())
    }

    pub fn current(&self) -> Option<&StatusSnapshot> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatusSnapshot> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[StatusSnapshot] {
        &self.0
    }

    fn last_recorded_at(&self) -> Option<DateTime<Utc>> {
        self.0.iter().rev().find_map(|s| s.recorded_at)
    }

    /// Ordering key used to detect stale re-fetches: longer histories are
    /// newer, equal lengths are ordered by the latest timestamp.
    pub fn freshness(&self) -> (usize, Option<DateTime<Utc>>) {
        (self.0.len(), self.last_recorded_at())
    }
}

impl<'a> IntoIterator for &'a StatusHistory {
    type Item = &'a StatusSnapshot;
    type IntoIter = std::slice::Iter<'a, StatusSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A server under migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub ip_address: String,
    pub environment: String,
    #[serde(default)]
    pub os: Option<String>,
    /// Owning team
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: StatusHistory,
}

impl Server {
    pub fn new(
        id: ServerId,
        name: impl Into<String>,
        ip_address: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            ip_address: ip_address.into(),
            environment: environment.into(),
            os: None,
            owner: None,
            tags: Vec::new(),
            created_at: None,
            history: StatusHistory::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_history(mut self, history: StatusHistory) -> Self {
        self.history = history;
        self
    }
}
