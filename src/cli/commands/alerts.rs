//! Alert CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::services::{alert_correlator, AlertBadges, AlertFilter, CorrelatedAlert};

#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertCommands,
}

#[derive(Subcommand, Debug)]
pub enum AlertCommands {
    /// List alerts joined with their servers
    List {
        /// Match title, message, server name or address (case-insensitive)
        #[arg(short, long, default_value = "")]
        search: String,
        /// high, medium, low or all
        #[arg(long, default_value = "all")]
        severity: String,
        /// resolved, unresolved or all
        #[arg(long, default_value = "all")]
        status: String,
        /// Order by severity, then newest first
        #[arg(short, long)]
        priority: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct AlertListOutput {
    pub alerts: Vec<CorrelatedAlert>,
    pub total: usize,
    pub badges: AlertBadges,
}

impl CommandOutput for AlertListOutput {
    fn to_human(&self) -> String {
        let badges = format!(
            "{} unresolved, {} high priority",
            self.badges.unresolved, self.badges.high_priority
        );
        if self.alerts.is_empty() {
            return format!("No alerts match ({badges}).");
        }
        format!(
            "Found {} alert(s) ({badges}):\n{}",
            self.total,
            TableFormatter::new().format_alerts(&self.alerts)
        )
    }
}

pub async fn execute(args: AlertsArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    ctx.load_fleet().await?;

    match args.command {
        AlertCommands::List {
            search,
            severity,
            status,
            priority,
        } => {
            let filter = AlertFilter::from_params(&search, &severity, &status)?;
            let out = ctx.session().with_fleet(|servers, alerts| {
                let mut matched = alert_correlator::filter(alerts, servers, &filter);
                if priority {
                    alert_correlator::prioritize(&mut matched);
                }
                AlertListOutput {
                    total: matched.len(),
                    badges: alert_correlator::badge_counts(alerts),
                    alerts: matched,
                }
            });
            output(&out, json_mode);
        }
    }

    Ok(())
}
