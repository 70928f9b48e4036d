//! migdash CLI entry point.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use migdash::cli::{commands, handle_error, AppContext, Cli, Commands};
use migdash::infrastructure::config::ConfigLoader;
use migdash::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConfigLoader::load_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return handle_error(err, cli.json),
    };

    // Keeps the file writer alive until main returns.
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => return handle_error(err.context("Failed to initialize logging"), cli.json),
    };

    let ctx = match AppContext::new(config).context("Failed to initialize") {
        Ok(ctx) => ctx,
        Err(err) => return handle_error(err, cli.json),
    };

    match run(cli.command, &ctx, cli.json).await {
        Ok(code) => code,
        Err(err) => handle_error(err, cli.json),
    }
}

async fn run(command: Commands, ctx: &AppContext, json_mode: bool) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Servers(args) => commands::servers::execute(args, ctx, json_mode).await?,
        Commands::Alerts(args) => commands::alerts::execute(args, ctx, json_mode).await?,
        Commands::Summary(args) => commands::summary::execute(args, ctx, json_mode).await?,
        Commands::Watch(args) => commands::watch::execute(args, ctx, json_mode).await?,
        Commands::Check(args) => return commands::check::execute(args, ctx, json_mode).await,
    }
    Ok(ExitCode::SUCCESS)
}
