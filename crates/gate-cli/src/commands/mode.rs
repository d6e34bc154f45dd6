//! Runtime mode commands

use crate::client::GatewayClient;
use crate::output::{OutputFormat, OutputFormatter};
use anyhow::Result;

/// Show the current runtime mode
pub async fn show(client: &GatewayClient, output_format: OutputFormat) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);
    let mode = client.mode().await?;
    formatter.print_item(&mode)
}

/// Switch the runtime mode
pub async fn set(
    client: &GatewayClient,
    output_format: OutputFormat,
    target: &str,
    gpu_url: Option<String>,
) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);

    let mode = client.set_mode(target, gpu_url.as_deref()).await?;
    formatter.print_success(&format!("Runtime mode set to {}", mode.target))?;
    formatter.print_item(&mode)
}
