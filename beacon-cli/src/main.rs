//! Beacon CLI
//!
//! Command-line interface for browsing and operating pipelines on a controller.

mod commands;
mod config;
mod id_resolver;
mod render;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Pipeline controller CLI", long_about = None)]
struct Cli {
    /// Controller URL
    #[arg(long, env = "BEACON_CONTROLLER_URL")]
    controller_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_cli=info,beacon_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.controller_url)?;

    handle_command(cli.command, &config).await
}
