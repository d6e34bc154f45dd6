//! Request metrics command

use crate::client::GatewayClient;
use crate::output::{OutputFormat, OutputFormatter};
use anyhow::Result;
use colored::*;

/// Show aggregated request metrics
pub async fn show(client: &GatewayClient, output_format: OutputFormat) -> Result<()> {
    let formatter = OutputFormatter::new(output_format);
    let report = client.metrics().await?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": report.summary,
                    "last": report.last,
                }))?
            );
        }
        OutputFormat::Yaml => {
            println!("summary:");
            for (mode, avg) in &report.summary {
                println!("  {}: {}", mode, avg);
            }
            formatter.print_list(&report.last)?;
        }
        OutputFormat::Table | OutputFormat::Text => {
            if report.summary.is_empty() {
                println!("{}", "No samples recorded yet".dimmed());
            }
            for (mode, avg) in &report.summary {
                println!("{}: {} ms average", mode.bold().cyan(), avg);
            }
            formatter.print_list(&report.last)?;
        }
    }
    Ok(())
}
