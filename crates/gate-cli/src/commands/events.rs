//! Runtime event log commands

use crate::client::GatewayClient;
use crate::output::{OutputFormat, OutputFormatter};
use anyhow::Result;

/// Show the runtime event log, most recent last
pub async fn list(
    client: &GatewayClient,
    output_format: OutputFormat,
    limit: Option<usize>,
) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);

    let mut events = client.events().await?;
    if let Some(limit) = limit {
        let start = events.len().saturating_sub(limit);
        events = events.split_off(start);
    }

    formatter.print_list(&events)
}

/// Truncate the runtime event log
pub async fn clear(client: &GatewayClient, output_format: OutputFormat) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);
    client.clear_events().await?;
    formatter.print_success("Runtime event log cleared")
}
