//! IdeaForge CLI and REST API entry point.
//!
//! Binary name: `forge`
//!
//! Parses CLI arguments, loads configuration and connects the LLM provider,
//! then runs a single build or starts the REST API server.

mod cli;
mod http;
mod state;

use anyhow::anyhow;
use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use ideaforge_infra::config::{load_forge_config, resolve_data_dir};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,ideaforge_core=debug,ideaforge_api=debug",
        _ => "trace",
    };
    ideaforge_observe::tracing_setup::init_tracing(filter, cli.otel).map_err(|e| anyhow!(e))?;

    let result = run(cli).await;
    ideaforge_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions and config display don't need a provider
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "forge", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config => {
            let data_dir = resolve_data_dir();
            let config = load_forge_config(&data_dir).await;
            return cli::config::show_config(&data_dir, &config, cli.json);
        }
        _ => {}
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Build(args) => {
            cli::build::run_build(&state, args, cli.json, cli.quiet).await?;
        }
        Commands::Serve { port, host } => {
            cli::serve::serve(state, &host, port).await?;
        }
        Commands::Config | Commands::Completions { .. } => {}
    }

    Ok(())
}
