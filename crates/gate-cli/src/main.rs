//! medgate - Command-line interface for the medgate gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::debug;

mod client;
mod commands;
mod output;

use client::GatewayClient;
use output::OutputFormat;

/// Command-line interface for the medgate gateway
#[derive(Debug, Parser)]
#[command(name = "medgate")]
#[command(about = "Command-line interface for the medgate gateway")]
#[command(version)]
pub struct Cli {
    /// Gateway endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    endpoint: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable JSON output (overrides --output)
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Timeout for requests in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List registered backend endpoints
    #[command(name = "list-servers")]
    ListServers {
        /// Filter by endpoint status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Register or replace a backend endpoint
    #[command(name = "add-server")]
    AddServer {
        /// Stable endpoint identifier
        id: String,

        /// Base URL of the endpoint
        url: String,

        /// Display label
        #[arg(short, long)]
        name: Option<String>,

        /// Initial status (active, inactive, unknown)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show the registry change log
    #[command(name = "server-logs")]
    ServerLogs,

    /// Resolve the preferred endpoint
    #[command(name = "latest")]
    Latest,

    /// Probe a candidate endpoint
    #[command(name = "check")]
    Check {
        /// Base URL to probe
        url: String,

        /// Timeout budget in milliseconds
        #[arg(long, default_value = "3000")]
        timeout_ms: u64,
    },

    /// Show the current runtime mode
    #[command(name = "mode")]
    Mode,

    /// Switch the runtime mode
    #[command(name = "set-mode")]
    SetMode {
        /// Compute target (cpu or gpu)
        target: String,

        /// GPU base URL, only meaningful with a gpu target
        #[arg(long)]
        gpu_url: Option<String>,
    },

    /// Show the runtime event log
    #[command(name = "events")]
    Events {
        /// Show only the most recent N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Truncate the runtime event log
    #[command(name = "clear-events")]
    ClearEvents,

    /// Show aggregated request metrics
    #[command(name = "metrics")]
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("gate_cli={},gate_core={}", log_level, log_level))
        .with_target(false)
        .init();

    debug!("Starting medgate CLI with args: {:?}", cli);

    // Determine output format
    let output_format = if cli.json {
        OutputFormat::Json
    } else {
        cli.output
    };

    let client = GatewayClient::new(&cli.endpoint, Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::ListServers { status } => {
            commands::servers::list(&client, output_format, status).await
        }
        Commands::AddServer {
            id,
            url,
            name,
            status,
        } => commands::servers::add(&client, output_format, &id, &url, name, status).await,
        Commands::ServerLogs => commands::servers::logs(&client, output_format).await,
        Commands::Latest => commands::servers::latest(&client, output_format).await,
        Commands::Check { url, timeout_ms } => {
            commands::check::run(&client, output_format, &url, timeout_ms).await
        }
        Commands::Mode => commands::mode::show(&client, output_format).await,
        Commands::SetMode { target, gpu_url } => {
            commands::mode::set(&client, output_format, &target, gpu_url).await
        }
        Commands::Events { limit } => commands::events::list(&client, output_format, limit).await,
        Commands::ClearEvents => commands::events::clear(&client, output_format).await,
        Commands::Metrics => commands::metrics::show(&client, output_format).await,
    }
}
