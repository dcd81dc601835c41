//! Conductor CLI entry point.
//!
//! Binary name: `conductor`
//!
//! Parses CLI arguments, sets up tracing, loads the configuration file and
//! dispatches to the command handlers.

mod cli;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use conductor_observe::tracing_setup::{init_tracing, level_for_verbosity, shutdown_tracing, TracingOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions need nothing else
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "conductor", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&TracingOptions {
        default_directive: level_for_verbosity(cli.verbose).to_string(),
        json: cli.json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = conductor_infra::config::load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Validate { file } => cli::workflow::validate(&file, cli.json),
        Commands::Inspect { file } => cli::workflow::inspect(&file, &config, cli.json),
        Commands::Run(args) => cli::workflow::run(args, config, cli.json).await,
        Commands::Route(args) => cli::route::route(args, config, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    }
}
