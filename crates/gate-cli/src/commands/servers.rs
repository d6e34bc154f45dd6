//! Registry commands

use crate::client::GatewayClient;
use crate::output::{OutputFormat, OutputFormatter};
use anyhow::Result;

/// List registered endpoints, optionally filtered by status
pub async fn list(
    client: &GatewayClient,
    output_format: OutputFormat,
    status: Option<String>,
) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);

    let mut servers = client.list_servers().await?;
    if let Some(status) = status {
        let status = status.to_lowercase();
        servers.retain(|s| s.status.to_string() == status);
    }

    formatter.print_list(&servers)
}

/// Register or replace an endpoint
pub async fn add(
    client: &GatewayClient,
    output_format: OutputFormat,
    id: &str,
    url: &str,
    name: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);

    let item = client
        .add_server(id, url, name.as_deref(), status.as_deref())
        .await?;

    formatter.print_success(&format!("Registered endpoint {}", item.id))?;
    formatter.print_item(&item)
}

/// Show the registry change log
pub async fn logs(client: &GatewayClient, output_format: OutputFormat) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);
    let logs = client.server_logs().await?;
    formatter.print_list(&logs)
}

/// Resolve the preferred endpoint
pub async fn latest(client: &GatewayClient, output_format: OutputFormat) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);
    let latest = client.latest().await?;

    match latest.item {
        Some(item) => {
            formatter.print_item(&item)?;
        }
        None => {
            formatter.print_success(&format!(
                "Registry empty, default endpoint {} stands",
                latest.url
            ))?;
        }
    }
    Ok(())
}
