//! Derived fleet views.
//!
//! Nothing in this module is stored; every value is recomputed from the
//! server and alert collections.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::server::{MigrationStatus, ServerId};

/// Closed interval of instants a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportingWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The last `days` calendar days (UTC) up to and including `now`.
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        let first_day = now.date_naive() - Duration::days(i64::from(days.max(1)) - 1);
        let start = first_day.and_time(chrono::NaiveTime::MIN).and_utc();
        Self { start, end: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// Every calendar day touched by the window, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let last = self.end.date_naive();
        let mut day = self.start.date_naive();
        while day <= last {
            days.push(day);
            day += Duration::days(1);
        }
        days
    }
}

/// Completed / (completed + failed), or nothing to report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessRate {
    Percent(f64),
    NotAvailable,
}

impl SuccessRate {
    pub fn from_counts(completed: usize, failed: usize) -> Self {
        let total = completed + failed;
        if total == 0 {
            Self::NotAvailable
        } else {
            #[allow(clippy::cast_precision_loss)]
            let pct = completed as f64 * 100.0 / total as f64;
            Self::Percent(pct)
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::NotAvailable => None,
        }
    }
}

impl std::fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p:.1}%"),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Tally of one check kind across the fleet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCounts {
    pub passed: usize,
    pub warning: usize,
    pub failed: usize,
    pub running: usize,
    /// Not started, not applicable or unknown
    pub pending: usize,
}

/// Fleet-wide summary counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_servers: usize,
    pub by_status: BTreeMap<MigrationStatus, usize>,
    pub precheck: CheckCounts,
    pub postcheck: CheckCounts,
    pub window: ReportingWindow,
    pub completed_in_window: usize,
    pub failed_in_window: usize,
    pub success_rate: SuccessRate,
    pub unresolved_alerts: usize,
    pub high_priority_alerts: usize,
}

impl FleetSummary {
    pub fn count(&self, status: MigrationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// One day of the migration timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: usize,
    pub failed: usize,
}

impl TrendPoint {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// A named value for pie/bar charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlice {
    pub name: String,
    pub value: usize,
}

/// Per-environment outcome counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRow {
    pub environment: String,
    pub completed: usize,
    pub failed: usize,
    pub warning: usize,
}

/// Badge tone for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Success,
    Warning,
    Error,
    Info,
}

/// A recent status change on the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub server_id: ServerId,
    pub server_name: String,
    pub tone: StatusTone,
    pub action: String,
    pub at: Option<DateTime<Utc>>,
}

/// The headline counters the dashboard cards show.
///
/// `migrated_servers` counts servers whose migration is `Completed`, which
/// is how the backend's pre-aggregated summary defines it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub total_servers: usize,
    pub ready_servers: usize,
    pub blocked_servers: usize,
    pub migrated_servers: usize,
    pub postcheck_passed: usize,
}

/// A counter that differs between local aggregation and the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDrift {
    pub counter: String,
    pub local: usize,
    pub remote: usize,
}
