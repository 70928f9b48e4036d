//! Watch command: keep the session in step with the backend and print a
//! one-line summary per refresh until interrupted.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::cli::context::AppContext;
use crate::domain::errors::DomainResult;
use crate::domain::models::{MigrationStatus, ReportingWindow, SuccessRate};
use crate::services::{FleetRefresh, FleetSession};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between refreshes (defaults to refresh.poll_interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// One line of watch output.
#[derive(Debug, Serialize)]
pub struct WatchTick {
    pub at: DateTime<Utc>,
    pub servers: usize,
    pub ready: usize,
    pub blocked: usize,
    pub completed: usize,
    pub success_rate: SuccessRate,
    pub unresolved_alerts: usize,
    pub error: Option<String>,
}

impl WatchTick {
    fn build(session: &FleetSession, window_days: u32, round: &DomainResult<FleetRefresh>) -> Self {
        let now = Utc::now();
        let summary = session.summarize(&ReportingWindow::last_days(window_days, now));
        Self {
            at: now,
            servers: summary.total_servers,
            ready: summary.count(MigrationStatus::Ready),
            blocked: summary.count(MigrationStatus::Blocked),
            completed: summary.count(MigrationStatus::Completed),
            success_rate: summary.success_rate,
            unresolved_alerts: summary.unresolved_alerts,
            error: round.as_ref().err().map(ToString::to_string),
        }
    }

    fn to_line(&self, json_mode: bool) -> String {
        if json_mode {
            return serde_json::to_string(self).unwrap_or_default();
        }
        let mut line = format!(
            "[{}] servers {} | ready {} | blocked {} | completed {} | success {} | open alerts {}",
            self.at.format("%H:%M:%S"),
            self.servers,
            self.ready,
            self.blocked,
            self.completed,
            self.success_rate,
            self.unresolved_alerts,
        );
        if let Some(err) = &self.error {
            line.push_str(&format!(" | refresh failed: {err}"));
        }
        line
    }
}

pub async fn execute(args: WatchArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let secs = args.interval.unwrap_or(ctx.config.refresh.poll_interval_secs);
    if secs == 0 {
        bail!("--interval must be greater than 0");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    info!(interval_secs = secs, "watching fleet");
    let session = ctx.session().clone();
    let window_days = ctx.config.reporting.window_days;
    ctx.sync()
        .poll(Duration::from_secs(secs), shutdown_rx, |round| {
            println!("{}", WatchTick::build(&session, window_days, round).to_line(json_mode));
        })
        .await;

    // Late writes from an unfinished round are dropped.
    session.invalidate();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;

    #[test]
    fn test_tick_reports_refresh_failure() {
        let session = FleetSession::new();
        let round = Err(DomainError::Timeout(500));
        let tick = WatchTick::build(&session, 7, &round);
        assert_eq!(tick.servers, 0);
        assert_eq!(tick.success_rate, SuccessRate::NotAvailable);
        let line = tick.to_line(false);
        assert!(line.contains("servers 0"));
        assert!(line.contains("refresh failed"));
    }

    #[test]
    fn test_tick_json_line() {
        let session = FleetSession::new();
        let round = Ok(FleetRefresh {
            servers: 0,
            alerts: 0,
            outcome: crate::services::ApplyOutcome::Applied,
        });
        let tick = WatchTick::build(&session, 7, &round);
        let value: serde_json::Value = serde_json::from_str(&tick.to_line(true)).unwrap();
        assert_eq!(value["servers"], 0);
        assert!(value["error"].is_null());
    }
}
