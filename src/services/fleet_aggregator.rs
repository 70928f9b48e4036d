//! Fleet aggregation.
//!
//! Pure projections of the server and alert collections into dashboard
//! counters and chart series. No function here reads the clock or keeps
//! state: identical inputs produce identical outputs, so the same render
//! cycle can call them repeatedly and get consistent charts.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::models::{
    ActivityEntry, Alert, ChartSlice, CheckCounts, CheckStatus, CountDrift, DashboardCounts,
    EnvironmentRow, FleetSummary, MigrationStatus, ReportingWindow, Server, SuccessRate,
    TrendPoint,
};
use crate::services::alert_correlator::badge_counts;
use crate::services::lifecycle::{activity_label, current_status, status_tone};

fn tally(counts: &mut CheckCounts, status: CheckStatus) {
    match status {
        CheckStatus::Passed => counts.passed += 1,
        CheckStatus::Warning => counts.warning += 1,
        CheckStatus::Failed => counts.failed += 1,
        CheckStatus::Running => counts.running += 1,
        CheckStatus::NotStarted | CheckStatus::NotApplicable | CheckStatus::Unknown => {
            counts.pending += 1;
        }
    }
}

/// Summarize the fleet.
///
/// Status buckets use each server's current status only. The success rate
/// covers servers whose current status is Completed or Failed and was
/// recorded inside `window`.
pub fn summarize(servers: &[Server], alerts: &[Alert], window: &ReportingWindow) -> FleetSummary {
    let mut by_status: BTreeMap<MigrationStatus, usize> =
        MigrationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut precheck = CheckCounts::default();
    let mut postcheck = CheckCounts::default();
    let mut completed_in_window = 0;
    let mut failed_in_window = 0;

    for server in servers {
        let current = current_status(server);
        *by_status.entry(current.migration_status).or_insert(0) += 1;
        tally(&mut precheck, current.precheck_status);
        tally(&mut postcheck, current.postcheck_status);

        let in_window = current.recorded_at.is_some_and(|at| window.contains(at));
        match current.migration_status {
            MigrationStatus::Completed if in_window => completed_in_window += 1,
            MigrationStatus::Failed if in_window => failed_in_window += 1,
            _ => {}
        }
    }

    let badges = badge_counts(alerts);

    FleetSummary {
        total_servers: servers.len(),
        by_status,
        precheck,
        postcheck,
        window: *window,
        completed_in_window,
        failed_in_window,
        success_rate: SuccessRate::from_counts(completed_in_window, failed_in_window),
        unresolved_alerts: badges.unresolved,
        high_priority_alerts: badges.high_priority,
    }
}

/// Completed and failed migrations per calendar day of `window`.
///
/// A migration counts on the day its history first enters Completed or
/// Failed (re-observations of the same terminal status are not counted
/// again). Every day of the window is present, ascending.
pub fn migration_timeline(servers: &[Server], window: &ReportingWindow) -> Vec<TrendPoint> {
    let mut days: BTreeMap<NaiveDate, TrendPoint> = window
        .days()
        .into_iter()
        .map(|date| {
            (
                date,
                TrendPoint {
                    date,
                    completed: 0,
                    failed: 0,
                },
            )
        })
        .collect();

    for server in servers {
        let mut previous: Option<MigrationStatus> = None;
        for snapshot in &server.history {
            let status = snapshot.migration_status;
            let entered = previous != Some(status) && status.is_terminal();
            previous = Some(status);
            if !entered {
                continue;
            }
            let Some(at) = snapshot.recorded_at.filter(|at| window.contains(*at)) else {
                continue;
            };
            if let Some(point) = days.get_mut(&at.date_naive()) {
                match status {
                    MigrationStatus::Completed => point.completed += 1,
                    MigrationStatus::Failed => point.failed += 1,
                    _ => {}
                }
            }
        }
    }

    days.into_values().collect()
}

/// Pre-check and post-check pass/fail slices.
pub fn check_breakdown(servers: &[Server]) -> Vec<ChartSlice> {
    let mut precheck = CheckCounts::default();
    let mut postcheck = CheckCounts::default();
    for server in servers {
        let current = current_status(server);
        tally(&mut precheck, current.precheck_status);
        tally(&mut postcheck, current.postcheck_status);
    }

    vec![
        ChartSlice { name: "PreCheck Passed".to_string(), value: precheck.passed },
        ChartSlice { name: "PreCheck Failed".to_string(), value: precheck.failed },
        ChartSlice { name: "PostCheck Passed".to_string(), value: postcheck.passed },
        ChartSlice { name: "PostCheck Failed".to_string(), value: postcheck.failed },
    ]
}

/// Outcome counts per environment, sorted by environment name.
pub fn environment_breakdown(servers: &[Server]) -> Vec<EnvironmentRow> {
    let mut rows: BTreeMap<&str, EnvironmentRow> = BTreeMap::new();
    for server in servers {
        let row = rows
            .entry(server.environment.as_str())
            .or_insert_with(|| EnvironmentRow {
                environment: server.environment.clone(),
                completed: 0,
                failed: 0,
                warning: 0,
            });
        let current = current_status(server);
        match current.migration_status {
            MigrationStatus::Completed => row.completed += 1,
            MigrationStatus::Failed => row.failed += 1,
            _ if current.precheck_status == CheckStatus::Warning
                || current.postcheck_status == CheckStatus::Warning =>
            {
                row.warning += 1;
            }
            _ => {}
        }
    }
    rows.into_values().collect()
}

/// The latest status of each server, newest first, at most `limit` entries.
///
/// Servers without a timestamped status are left out.
pub fn recent_activity(servers: &[Server], limit: usize) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = servers
        .iter()
        .filter_map(|server| {
            let current = current_status(server);
            current.recorded_at.map(|at| ActivityEntry {
                server_id: server.id,
                server_name: server.name.clone(),
                tone: status_tone(current),
                action: activity_label(current),
                at: Some(at),
            })
        })
        .collect();

    entries.sort_by(|a, b| b.at.cmp(&a.at).then_with(|| a.server_id.cmp(&b.server_id)));
    entries.truncate(limit);
    entries
}

impl From<&FleetSummary> for DashboardCounts {
    fn from(summary: &FleetSummary) -> Self {
        Self {
            total_servers: summary.total_servers,
            ready_servers: summary.count(MigrationStatus::Ready),
            blocked_servers: summary.count(MigrationStatus::Blocked),
            migrated_servers: summary.count(MigrationStatus::Completed),
            postcheck_passed: summary.postcheck.passed,
        }
    }
}

/// Counters where the backend's pre-aggregated summary disagrees with
/// local aggregation.
pub fn count_drift(local: &DashboardCounts, remote: &DashboardCounts) -> Vec<CountDrift> {
    [
        ("total_servers", local.total_servers, remote.total_servers),
        ("ready_servers", local.ready_servers, remote.ready_servers),
        ("blocked_servers", local.blocked_servers, remote.blocked_servers),
        ("migrated_servers", local.migrated_servers, remote.migrated_servers),
        ("postcheck_passed", local.postcheck_passed, remote.postcheck_passed),
    ]
    .into_iter()
    .filter(|(_, l, r)| l != r)
    .map(|(counter, local, remote)| CountDrift {
        counter: counter.to_string(),
        local,
        remote,
    })
    .collect()
}
