//! Main binary for the medgate gateway daemon (medgated)

use anyhow::Result;
use clap::Parser;
use gate_core::{Config, LoggingConfig};
use gate_router::GatewayServer;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "medgated")]
#[command(about = "Compute runtime gateway daemon for the medical consultation service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bind address override
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Data directory override
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level override
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path.clone())?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data.dir = data_dir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging);

    info!(
        bind = %config.http_bind_addr(),
        data_dir = %config.data.dir.display(),
        "Starting medgate gateway"
    );

    GatewayServer::new(config).serve().await?;

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}
