//! Output formatting for the medgate CLI

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use gate_core::{EndpointRecord, MetricSample, RegistryLogEntry, RuntimeEvent, RuntimeMode};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Compact text format
    Text,
}

/// Trait for types that can be formatted for output
pub trait Formattable {
    /// Format as a table row
    fn table_headers() -> Vec<String>;
    fn table_row(&self) -> Vec<String>;

    /// Format as key-value pairs for detailed view
    fn key_value_pairs(&self) -> Vec<(String, String)>;
}

/// Output formatter
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format and print a single item
    pub fn print_item<T>(&self, item: &T) -> Result<()>
    where
        T: Serialize + Formattable,
    {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(item)?);
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(item)?);
            }
            OutputFormat::Table | OutputFormat::Text => {
                for (key, value) in item.key_value_pairs() {
                    match self.format {
                        OutputFormat::Table => println!("{}: {}", key.bold().cyan(), value),
                        _ => println!("{}: {}", key, value),
                    }
                }
            }
        }
        Ok(())
    }

    /// Format and print a list of items
    pub fn print_list<T>(&self, items: &[T]) -> Result<()>
    where
        T: Serialize + Formattable,
    {
        if items.is_empty() {
            match self.format {
                OutputFormat::Json => println!("[]"),
                OutputFormat::Yaml => println!("[]"),
                OutputFormat::Table | OutputFormat::Text => {
                    println!("{}", "No items found".dimmed());
                }
            }
            return Ok(());
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(items)?);
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(items)?);
            }
            OutputFormat::Table => {
                self.print_table(items);
            }
            OutputFormat::Text => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        println!();
                    }
                    for (key, value) in item.key_value_pairs() {
                        println!("{}: {}", key, value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Print items as a table
    fn print_table<T>(&self, items: &[T])
    where
        T: Formattable,
    {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let header_cells: Vec<Cell> = T::table_headers()
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
            .collect();
        table.set_header(header_cells);

        for item in items {
            table.add_row(item.table_row());
        }

        println!("{}", table);
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let result = serde_json::json!({ "status": "success", "message": message });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            OutputFormat::Yaml => {
                println!("status: success");
                println!("message: {}", message);
            }
            OutputFormat::Table | OutputFormat::Text => {
                println!("{} {}", "✓".green().bold(), message.green());
            }
        }
        Ok(())
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let result = serde_json::json!({ "status": "error", "message": message });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            OutputFormat::Yaml => {
                println!("status: error");
                println!("message: {}", message);
            }
            OutputFormat::Table | OutputFormat::Text => {
                eprintln!("{} {}", "✗".red().bold(), message.red());
            }
        }
        Ok(())
    }
}

impl Formattable for EndpointRecord {
    fn table_headers() -> Vec<String> {
        vec![
            "ID".to_string(),
            "Name".to_string(),
            "URL".to_string(),
            "Status".to_string(),
            "Updated".to_string(),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone().unwrap_or_default(),
            self.url.clone(),
            self.status.to_string(),
            self.updated_at.to_rfc3339(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("ID".to_string(), self.id.clone()),
            ("Name".to_string(), self.name.clone().unwrap_or_default()),
            ("URL".to_string(), self.url.clone()),
            ("Status".to_string(), self.status.to_string()),
            ("Updated".to_string(), self.updated_at.to_rfc3339()),
        ]
    }
}

impl Formattable for RuntimeMode {
    fn table_headers() -> Vec<String> {
        vec![
            "Target".to_string(),
            "GPU URL".to_string(),
            "Updated".to_string(),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.target.to_string(),
            self.gpu_url.clone().unwrap_or_default(),
            self.updated_at.to_rfc3339(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("Target".to_string(), self.target.to_string()),
            (
                "GPU URL".to_string(),
                self.gpu_url.clone().unwrap_or_default(),
            ),
            ("Updated".to_string(), self.updated_at.to_rfc3339()),
        ]
    }
}

impl Formattable for RuntimeEvent {
    fn table_headers() -> Vec<String> {
        vec![
            "Time".to_string(),
            "Type".to_string(),
            "Details".to_string(),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        let (kind, details) = match self {
            RuntimeEvent::ModeChange { target, gpu_url, .. } => (
                "mode_change",
                match gpu_url {
                    Some(url) => format!("target={} gpu_url={}", target, url),
                    None => format!("target={}", target),
                },
            ),
            RuntimeEvent::Fallback { from, to, .. } => {
                ("fallback", format!("{} -> {}", from, to))
            }
            RuntimeEvent::GpuMetrics { data, .. } => ("gpu_metrics", data.to_string()),
        };
        vec![self.ts().to_rfc3339(), kind.to_string(), details]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        let row = self.table_row();
        vec![
            ("Time".to_string(), row[0].clone()),
            ("Type".to_string(), row[1].clone()),
            ("Details".to_string(), row[2].clone()),
        ]
    }
}

impl Formattable for RegistryLogEntry {
    fn table_headers() -> Vec<String> {
        vec![
            "Time".to_string(),
            "Type".to_string(),
            "ID".to_string(),
            "URL".to_string(),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        let (kind, id, url) = match self {
            RegistryLogEntry::Add { id, url, .. } => ("add", id, url),
            RegistryLogEntry::Update { id, url, .. } => ("update", id, url),
            RegistryLogEntry::ColabUpdate { id, url, .. } => ("colab_update", id, url),
        };
        vec![
            self.ts().to_rfc3339(),
            kind.to_string(),
            id.clone(),
            url.clone(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        let row = self.table_row();
        vec![
            ("Time".to_string(), row[0].clone()),
            ("Type".to_string(), row[1].clone()),
            ("ID".to_string(), row[2].clone()),
            ("URL".to_string(), row[3].clone()),
        ]
    }
}

impl Formattable for MetricSample {
    fn table_headers() -> Vec<String> {
        vec![
            "Time".to_string(),
            "Mode".to_string(),
            "Duration (ms)".to_string(),
            "OK".to_string(),
            "Endpoint".to_string(),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.ts.to_rfc3339(),
            self.mode.to_string(),
            self.duration_ms.to_string(),
            self.ok.to_string(),
            self.endpoint.clone(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("Time".to_string(), self.ts.to_rfc3339()),
            ("Mode".to_string(), self.mode.to_string()),
            ("Duration (ms)".to_string(), self.duration_ms.to_string()),
            ("OK".to_string(), self.ok.to_string()),
            ("Endpoint".to_string(), self.endpoint.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gate_core::{ComputeTarget, EndpointStatus};

    #[test]
    fn test_endpoint_record_rows_align_with_headers() {
        let record = EndpointRecord {
            id: "colab-ngrok".to_string(),
            name: None,
            url: "https://x.ngrok-free.dev".to_string(),
            status: EndpointStatus::Active,
            updated_at: Utc::now(),
        };
        assert_eq!(
            EndpointRecord::table_headers().len(),
            record.table_row().len()
        );
    }

    #[test]
    fn test_event_row_describes_fallback() {
        let event = RuntimeEvent::fallback(ComputeTarget::Gpu, ComputeTarget::Cpu);
        let row = event.table_row();
        assert_eq!(row[1], "fallback");
        assert_eq!(row[2], "gpu -> cpu");
    }
}
