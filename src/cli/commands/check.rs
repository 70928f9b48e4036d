//! Check command: start a pre-check or post-check and wait for the result.

use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::{CheckKind, ServerId};
use crate::services::{lifecycle, CheckOutcome, CheckReport, LifecycleAction};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Server ID
    pub server_id: i64,

    /// precheck or postcheck
    #[arg(value_parser = parse_kind)]
    pub kind: CheckKind,
}

/// Exit status for a check that ran but did not succeed (JSON mode).
pub const EXIT_CHECK_FAILED: u8 = 2;

/// Process exit status for a finished check.
pub fn exit_status(outcome: &CheckOutcome) -> u8 {
    if outcome.is_success() {
        0
    } else {
        EXIT_CHECK_FAILED
    }
}

fn parse_kind(s: &str) -> Result<CheckKind, String> {
    CheckKind::from_str(s).ok_or_else(|| format!("unknown check kind '{s}' (expected precheck or postcheck)"))
}

#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub report: CheckReport,
    /// Actions eligible on the refreshed server
    pub eligible_actions: Vec<LifecycleAction>,
}

impl CheckOutput {
    fn outcome_line(&self) -> String {
        let run = &self.report.run;
        match &self.report.outcome {
            CheckOutcome::Confirmed => format!("{} finished on server {}", run.kind.label(), run.server_id),
            CheckOutcome::RejectedByBackend { message } => format!("backend refused the {}: {message}", run.kind),
            CheckOutcome::ExecutionFailed { message } => format!("{} failed: {message}", run.kind.label()),
            CheckOutcome::TimedOut { after } => {
                format!("{} not confirmed within {}s", run.kind.label(), after.as_secs())
            }
            CheckOutcome::RefreshFailed { message } => {
                format!("{} finished but the server could not be re-read: {message}", run.kind.label())
            }
            CheckOutcome::Detached => "session ended before the check was reconciled".to_string(),
        }
    }
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.outcome_line()];
        if let Some(server) = &self.report.refreshed {
            lines.push(TableFormatter::new().format_servers(std::slice::from_ref(server)));
            let actions: Vec<&str> = self.eligible_actions.iter().map(|a| a.check_kind().as_str()).collect();
            lines.push(format!(
                "Eligible next: {}",
                if actions.is_empty() { "none".to_string() } else { actions.join(", ") }
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: CheckArgs, ctx: &AppContext, json_mode: bool) -> Result<ExitCode> {
    ctx.load_fleet().await?;
    let orchestrator = ctx.orchestrator();
    let server_id = ServerId(args.server_id);

    let handle = orchestrator.run_check(server_id, args.kind)?;
    let spinner = create_spinner(
        format!("Running {} on server {server_id}", args.kind.label()),
        json_mode,
    );

    let report = match handle.wait().await {
        Ok(report) => report,
        Err(err) => {
            spinner.finish_error("check did not report");
            return Err(anyhow!(err));
        }
    };

    let out = CheckOutput {
        eligible_actions: report
            .refreshed
            .as_ref()
            .map(|server| lifecycle::eligible_actions(server).into_iter().collect())
            .unwrap_or_default(),
        report,
    };

    match &out.report.outcome {
        CheckOutcome::Confirmed => spinner.finish_success("done"),
        CheckOutcome::RefreshFailed { .. } | CheckOutcome::Detached => spinner.finish_warning("unreconciled"),
        _ => spinner.finish_error("failed"),
    }

    if !out.report.outcome.is_success() && !json_mode {
        bail!(out.outcome_line());
    }
    output(&out, json_mode);
    Ok(ExitCode::from(exit_status(&out.report.outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("precheck"), Ok(CheckKind::Precheck));
        assert_eq!(parse_kind("post-check"), Ok(CheckKind::Postcheck));
        assert!(parse_kind("smoke").is_err());
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&CheckOutcome::Confirmed), 0);
        assert_eq!(exit_status(&CheckOutcome::Detached), EXIT_CHECK_FAILED);
        assert_eq!(
            exit_status(&CheckOutcome::RefreshFailed { message: "timeout".into() }),
            EXIT_CHECK_FAILED
        );
    }
}
