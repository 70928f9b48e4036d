//! Fleet summary command.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{
    ActivityEntry, ChartSlice, CountDrift, DashboardCounts, EnvironmentRow, FleetSummary,
    MigrationStatus, ReportingWindow, TrendPoint,
};
use crate::services::fleet_aggregator;

const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Reporting window in days (defaults to reporting.window_days)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Also fetch the backend's pre-aggregated views and report drift
    #[arg(short, long)]
    pub remote: bool,
}

/// Backend-side aggregates, when the backend offers them.
#[derive(Debug, Serialize)]
pub struct RemoteAggregates {
    pub counts: Option<DashboardCounts>,
    pub drift: Vec<CountDrift>,
    pub check_breakdown: Option<Vec<ChartSlice>>,
    pub timeline: Option<Vec<TrendPoint>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryOutput {
    pub summary: FleetSummary,
    pub timeline: Vec<TrendPoint>,
    pub check_breakdown: Vec<ChartSlice>,
    pub environments: Vec<EnvironmentRow>,
    pub recent_activity: Vec<ActivityEntry>,
    pub remote: Option<RemoteAggregates>,
}

impl SummaryOutput {
    fn remote_lines(remote: &RemoteAggregates) -> Vec<String> {
        match &remote.counts {
            None => vec!["Backend offers no dashboard summary.".to_string()],
            Some(_) if remote.drift.is_empty() => {
                vec!["Backend dashboard counts match local aggregation.".to_string()]
            }
            Some(_) => {
                let mut lines = vec!["Backend dashboard counts differ:".to_string()];
                lines.extend(remote.drift.iter().map(|d| {
                    format!("  {:<20} local {:>5}  backend {:>5}", d.counter, d.local, d.remote)
                }));
                lines
            }
        }
    }
}

impl CommandOutput for SummaryOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let s = &self.summary;
        let window = format!(
            "{} .. {}",
            s.window.start.format("%Y-%m-%d"),
            s.window.end.format("%Y-%m-%d %H:%M")
        );

        let mut pairs = vec![
            ("Window".to_string(), window),
            ("Servers".to_string(), s.total_servers.to_string()),
        ];
        pairs.extend(
            MigrationStatus::ALL
                .iter()
                .filter(|status| s.count(**status) > 0)
                .map(|status| (format!("  {}", status.label()), s.count(*status).to_string())),
        );
        pairs.extend([
            ("Completed in window".to_string(), s.completed_in_window.to_string()),
            ("Failed in window".to_string(), s.failed_in_window.to_string()),
            ("Success rate".to_string(), s.success_rate.to_string()),
            ("Unresolved alerts".to_string(), s.unresolved_alerts.to_string()),
            ("High priority alerts".to_string(), s.high_priority_alerts.to_string()),
        ]);

        let mut lines = vec![formatter.format_pairs(&pairs)];

        lines.push("\nMigration timeline:".to_string());
        lines.push(formatter.format_timeline(&self.timeline));

        let slices: Vec<(String, String)> = self
            .check_breakdown
            .iter()
            .map(|slice| (slice.name.clone(), slice.value.to_string()))
            .collect();
        lines.push("\nCheck results:".to_string());
        lines.push(formatter.format_pairs(&slices));

        if !self.environments.is_empty() {
            lines.push("\nBy environment:".to_string());
            lines.push(formatter.format_environments(&self.environments));
        }

        if !self.recent_activity.is_empty() {
            lines.push("\nRecent activity:".to_string());
            for entry in &self.recent_activity {
                let at = entry
                    .at
                    .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
                lines.push(format!("  {at}  {:<20} {}", entry.server_name, entry.action));
            }
        }

        if let Some(remote) = &self.remote {
            lines.push(String::new());
            lines.extend(Self::remote_lines(remote));
        }

        lines.join("\n")
    }
}

pub async fn execute(args: SummaryArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let days = args.days.unwrap_or(ctx.config.reporting.window_days);
    if !(1..=366).contains(&days) {
        bail!("--days must be between 1 and 366, got {days}");
    }

    ctx.load_fleet().await?;
    let window = ReportingWindow::last_days(days, Utc::now());
    let summary = ctx.session().summarize(&window);

    let (timeline, check_breakdown, environments, recent_activity) =
        ctx.session().with_fleet(|servers, _| {
            (
                fleet_aggregator::migration_timeline(servers, &window),
                fleet_aggregator::check_breakdown(servers),
                fleet_aggregator::environment_breakdown(servers),
                fleet_aggregator::recent_activity(servers, RECENT_ACTIVITY_LIMIT),
            )
        });

    let remote = if args.remote {
        let source = ctx.sync().source();
        let (counts, check_breakdown, timeline) = futures::try_join!(
            source.fetch_dashboard_counts(),
            source.fetch_check_breakdown(),
            source.fetch_timeline(),
        )?;
        let drift = counts
            .as_ref()
            .map(|remote| fleet_aggregator::count_drift(&DashboardCounts::from(&summary), remote))
            .unwrap_or_default();
        Some(RemoteAggregates {
            counts,
            drift,
            check_breakdown,
            timeline,
        })
    } else {
        None
    };

    let out = SummaryOutput {
        summary,
        timeline,
        check_breakdown,
        environments,
        recent_activity,
        remote,
    };
    output(&out, json_mode);
    Ok(())
}
