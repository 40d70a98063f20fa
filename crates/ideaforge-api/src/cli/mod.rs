//! CLI command definitions for the `forge` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod build;
pub mod config;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use ideaforge_types::build::Tier;

/// Turn a product idea into market research, a strategy, and a code scaffold.
#[derive(Parser)]
#[command(name = "forge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a build and wait for it to finish.
    Build(BuildArgs),

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Show the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// The product idea to build.
    #[arg(long)]
    pub idea: String,

    /// Who the product is for.
    #[arg(long = "market")]
    pub target_market: String,

    /// Subscription tier (free, starter, premium).
    #[arg(long, default_value = "free")]
    pub tier: Tier,

    /// Country to focus market research on.
    #[arg(long)]
    pub country: Option<String>,

    /// Write result.json and the generated files into this directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
}
