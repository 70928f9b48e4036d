//! Command-line interface.
//!
//! Every command loads configuration, builds an [`AppContext`] and prints
//! either human-readable tables or JSON (`--json`).

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

pub use context::AppContext;

/// Server migration tracking from the terminal.
#[derive(Parser, Debug)]
#[command(name = "migdash", version, about = "Track server migrations, checks and alerts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Extra configuration file, merged over .migdash/config.yaml
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect servers in the migration fleet
    Servers(commands::servers::ServersArgs),
    /// Inspect migration alerts
    Alerts(commands::alerts::AlertsArgs),
    /// Fleet summary for a reporting window
    Summary(commands::summary::SummaryArgs),
    /// Run a pre-check or post-check on a server
    Check(commands::check::CheckArgs),
    /// Poll the backend and print a summary line per refresh
    Watch(commands::watch::WatchArgs),
}

/// Print `err` in the selected output mode. Returns the failure exit code
/// so that `main` can unwind and flush logging before exiting.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ExitCode {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    ExitCode::FAILURE
}
