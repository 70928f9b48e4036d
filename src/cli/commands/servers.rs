//! Server CLI commands.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Server, ServerId, StatusSnapshot};
use crate::services::{alert_correlator, lifecycle, AlertFilter, CorrelatedAlert, LifecycleAction, ServerFilter};

#[derive(Args, Debug)]
pub struct ServersArgs {
    #[command(subcommand)]
    pub command: ServerCommands,
}

#[derive(Subcommand, Debug)]
pub enum ServerCommands {
    /// List servers with their current status
    List {
        /// Match server name (case-insensitive) or IP address
        #[arg(short, long, default_value = "")]
        search: String,
        /// Environment name, or "all"
        #[arg(short, long, default_value = "all")]
        environment: String,
        /// Migration status (e.g. ready, blocked), or "all"
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Show one server: history, eligible actions and alerts
    Show {
        /// Server ID
        id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct ServerListOutput {
    pub servers: Vec<Server>,
    pub total: usize,
    pub fleet_size: usize,
}

impl CommandOutput for ServerListOutput {
    fn to_human(&self) -> String {
        if self.servers.is_empty() {
            return format!("No servers match (fleet has {} server(s)).", self.fleet_size);
        }
        format!(
            "Showing {} of {} server(s):\n{}",
            self.total,
            self.fleet_size,
            TableFormatter::new().format_servers(&self.servers)
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ServerDetailOutput {
    pub server: Server,
    pub current: StatusSnapshot,
    pub eligible_actions: BTreeSet<LifecycleAction>,
    pub alerts: Vec<CorrelatedAlert>,
}

impl CommandOutput for ServerDetailOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let server = &self.server;
        let actions = if self.eligible_actions.is_empty() {
            "none".to_string()
        } else {
            self.eligible_actions
                .iter()
                .map(|a| a.check_kind().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let pairs = [
            ("ID", server.id.to_string()),
            ("Name", server.name.clone()),
            ("IP", server.ip_address.clone()),
            ("Environment", server.environment.clone()),
            ("OS", server.os.clone().unwrap_or_else(|| "-".into())),
            ("Owner", server.owner.clone().unwrap_or_else(|| "-".into())),
            ("Migration", self.current.migration_status.label().to_string()),
            ("Pre-check", self.current.precheck_status.label().to_string()),
            ("Post-check", self.current.postcheck_status.label().to_string()),
            ("Eligible", actions),
        ];

        let mut lines = vec![formatter.format_pairs(&pairs)];
        if server.history.is_empty() {
            lines.push("No status history recorded.".to_string());
        } else {
            lines.push(format!("\nHistory ({} snapshot(s)):", server.history.len()));
            lines.push(formatter.format_history(server));
        }
        if !self.alerts.is_empty() {
            lines.push(format!("\nAlerts ({}):", self.alerts.len()));
            lines.push(formatter.format_alerts(&self.alerts));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ServersArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    ctx.load_fleet().await?;
    let session = ctx.session();

    match args.command {
        ServerCommands::List {
            search,
            environment,
            status,
        } => {
            let filter = ServerFilter::from_params(&search, &environment, &status)?;
            let out = session.with_fleet(|servers, _| {
                let matched: Vec<Server> = filter.apply(servers).into_iter().cloned().collect();
                ServerListOutput {
                    total: matched.len(),
                    fleet_size: servers.len(),
                    servers: matched,
                }
            });
            output(&out, json_mode);
        }

        ServerCommands::Show { id } => {
            let id = ServerId(id);
            let out = session
                .with_fleet(|servers, alerts| {
                    let server = servers.iter().find(|s| s.id == id)?;
                    let alerts = alert_correlator::filter(alerts, servers, &AlertFilter::default())
                        .into_iter()
                        .filter(|c| c.alert.server_id == Some(id))
                        .collect();
                    Some(ServerDetailOutput {
                        current: lifecycle::current_status(server).clone(),
                        eligible_actions: lifecycle::eligible_actions(server),
                        server: server.clone(),
                        alerts,
                    })
                })
                .with_context(|| format!("Server {id} not found"))?;
            output(&out, json_mode);
        }
    }

    Ok(())
}
