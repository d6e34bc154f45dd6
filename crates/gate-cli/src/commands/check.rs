//! Health check command

use crate::client::GatewayClient;
use crate::output::{OutputFormat, OutputFormatter};
use anyhow::Result;

/// Probe a candidate endpoint through the gateway
pub async fn run(
    client: &GatewayClient,
    output_format: OutputFormat,
    url: &str,
    timeout_ms: u64,
) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);

    let result = client.check(url, timeout_ms).await?;
    if result.ok {
        formatter.print_success(&format!(
            "{} is reachable (status {})",
            url,
            result.status.unwrap_or_default()
        ))?;
    } else {
        match result.status {
            Some(status) => {
                formatter.print_error(&format!("{} answered with status {}", url, status))?
            }
            None => formatter.print_error(&format!("{} is unreachable", url))?,
        }
    }
    Ok(())
}
