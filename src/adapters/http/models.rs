//! Migration backend request and response models.
//!
//! These structs map to the backend's JSON payloads. They are used
//! internally by the HTTP adapter and are not part of the public domain
//! model; conversions into domain types are lenient and log what they
//! cannot interpret.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::models::{
    Alert, AlertId, AlertSeverity, ChartSlice, CheckStatus, DashboardCounts, MigrationStatus,
    Server, ServerId, StatusHistory, StatusSnapshot, TrendPoint,
};

/// Parse a backend timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn timestamp_or_warn(raw: Option<&str>, field: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!(field, value = raw, "unparseable timestamp from backend");
    }
    parsed
}

/// A tag attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDto {
    pub tag: String,
}

/// One row of a server's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDto {
    pub migration_status: Option<String>,
    #[serde(default)]
    pub precheck_status: Option<String>,
    #[serde(default)]
    pub postcheck_status: Option<String>,
    #[serde(default)]
    pub issue_summary: Option<String>,
    #[serde(default)]
    pub last_checked: Option<String>,
    #[serde(default)]
    pub is_current: bool,
}

fn migration_status(raw: Option<&str>, server_id: i64) -> MigrationStatus {
    match raw {
        None => MigrationStatus::Unknown,
        Some(raw) => MigrationStatus::from_str(raw).unwrap_or_else(|| {
            warn!(server_id, value = raw, "unrecognized migration status");
            MigrationStatus::Unknown
        }),
    }
}

fn check_status(raw: Option<&str>, server_id: i64, field: &str) -> CheckStatus {
    match raw {
        None => CheckStatus::NotStarted,
        Some(raw) => CheckStatus::from_str(raw).unwrap_or_else(|| {
            warn!(server_id, field, value = raw, "unrecognized check status");
            CheckStatus::Unknown
        }),
    }
}

impl StatusDto {
    fn into_snapshot(self, server_id: i64) -> StatusSnapshot {
        let snapshot = StatusSnapshot::new(
            migration_status(self.migration_status.as_deref(), server_id),
            check_status(self.precheck_status.as_deref(), server_id, "precheck_status"),
            check_status(self.postcheck_status.as_deref(), server_id, "postcheck_status"),
        )
        .with_issue(self.issue_summary.unwrap_or_default());
        match timestamp_or_warn(self.last_checked.as_deref(), "last_checked") {
            Some(at) => snapshot.recorded_at(at),
            None => snapshot,
        }
    }
}

/// Order a server's status rows. A single row flagged `is_current` is the
/// current snapshot whatever its timestamp; otherwise rows are ordered by
/// timestamp with the flag breaking ties.
fn history_from_rows(server_id: i64, mut rows: Vec<StatusDto>) -> StatusHistory {
    let flagged = rows.iter().filter(|row| row.is_current).count();
    if flagged == 1 {
        if let Some(pos) = rows.iter().position(|row| row.is_current) {
            let current = rows.remove(pos).into_snapshot(server_id);
            let earlier = rows.into_iter().map(|row| row.into_snapshot(server_id)).collect();
            return StatusHistory::with_current(earlier, current);
        }
    }

    if flagged > 1 {
        warn!(server_id, flagged, "backend marks several status rows current");
    }
    let mut rows: Vec<(bool, StatusSnapshot)> = rows
        .into_iter()
        .map(|row| (row.is_current, row.into_snapshot(server_id)))
        .collect();
    rows.sort_by(|(a_cur, a), (b_cur, b)| a.recorded_at.cmp(&b.recorded_at).then(a_cur.cmp(b_cur)));
    StatusHistory::from_unordered(rows.into_iter().map(|(_, s)| s).collect())
}

/// A server as returned by `GET /api/servers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDto {
    pub id: i64,
    pub name: String,
    pub ip_address: String,
    pub environment: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagDto>,
    #[serde(default)]
    pub statuses: Vec<StatusDto>,
}

impl From<ServerDto> for Server {
    fn from(dto: ServerDto) -> Self {
        let id = dto.id;
        let history = history_from_rows(id, dto.statuses);

        let mut server = Server::new(ServerId(id), dto.name, dto.ip_address, dto.environment)
            .with_tags(dto.tags.into_iter().map(|t| t.tag).collect())
            .with_history(history);
        server.os = dto.os;
        server.owner = dto.owner;
        server.created_at = timestamp_or_warn(dto.created_at.as_deref(), "created_at");
        server
    }
}

/// An alert as returned by `GET /api/alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDto {
    pub id: i64,
    #[serde(default)]
    pub server_id: Option<i64>,
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub resolved: bool,
    pub created_at: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl AlertDto {
    /// Convert to a domain alert. Alerts without a readable timestamp are
    /// dropped, since they cannot be ordered.
    pub fn into_alert(self) -> Option<Alert> {
        let Some(created_at) = parse_timestamp(&self.created_at) else {
            warn!(alert_id = self.id, value = %self.created_at, "dropping alert with unparseable timestamp");
            return None;
        };
        let severity = AlertSeverity::from_str(&self.severity).unwrap_or_else(|| {
            warn!(alert_id = self.id, value = %self.severity, "unrecognized alert severity, treating as low");
            AlertSeverity::Low
        });

        let mut alert = Alert::new(AlertId(self.id), severity, self.message, created_at);
        alert.server_id = self.server_id.map(ServerId);
        alert.team = self.team;
        alert.title = self.title;
        alert.resolved = self.resolved;
        Some(alert)
    }
}

/// Body of `GET /api/dashboard-summary`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DashboardSummaryDto {
    pub total_servers: usize,
    pub ready_servers: usize,
    pub blocked_servers: usize,
    pub migrated_servers: usize,
    pub postcheck_passed: usize,
}

impl From<DashboardSummaryDto> for DashboardCounts {
    fn from(dto: DashboardSummaryDto) -> Self {
        Self {
            total_servers: dto.total_servers,
            ready_servers: dto.ready_servers,
            blocked_servers: dto.blocked_servers,
            migrated_servers: dto.migrated_servers,
            postcheck_passed: dto.postcheck_passed,
        }
    }
}

/// One slice of `GET /api/migration-chart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSliceDto {
    pub name: String,
    pub value: usize,
}

impl From<ChartSliceDto> for ChartSlice {
    fn from(dto: ChartSliceDto) -> Self {
        Self {
            name: dto.name,
            value: dto.value,
        }
    }
}

/// One day of `GET /api/timeline-chart`. The date is a label like "Jan 07".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineDayDto {
    pub date: String,
    pub completed: usize,
    pub failed: usize,
}

/// Resolve a year-less "Mon DD" label to the most recent such date not
/// after `today`.
pub fn resolve_day_label(label: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parse = |year: i32| NaiveDate::parse_from_str(&format!("{} {year}", label.trim()), "%b %d %Y").ok();
    match parse(today.year()) {
        Some(date) if date <= today => Some(date),
        _ => parse(today.year() - 1),
    }
}

impl TimelineDayDto {
    pub fn into_point(self, today: NaiveDate) -> Option<TrendPoint> {
        let Some(date) = resolve_day_label(&self.date, today) else {
            warn!(value = %self.date, "unparseable timeline date label");
            return None;
        };
        Some(TrendPoint {
            date,
            completed: self.completed,
            failed: self.failed,
        })
    }
}

/// Body returned when a check is triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStartedDto {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
