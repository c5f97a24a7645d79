//! Switchyard CLI entry point.
//!
//! Binary name: `swyd`
//!
//! Parses CLI arguments, sets up tracing, loads configuration and backends,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use switchyard_observe::tracing_setup::{TracingConfig, init_tracing, shutdown_tracing, verbosity_filter};

use cli::chat::Output;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "swyd", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&TracingConfig {
        default_filter: verbosity_filter(cli.verbose, cli.quiet).to_string(),
        json: cli.json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Chat { prompt, request } => {
            cli::chat::run_chat(&state, &prompt, &request, out).await?;
        }
        Commands::Stream { prompt, request } => {
            cli::chat::run_stream(&state, &prompt, &request, out).await?;
        }
        Commands::Interactive {
            system,
            stream,
            request,
        } => {
            cli::interactive::run_interactive(&state, system, stream, request, out).await?;
        }
        Commands::Providers { test } => {
            cli::providers::list_providers(&state, test, out).await?;
        }
        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}
