//! Append-only metric sample log with aggregation

use crate::{jsonl, Result};
use gate_core::{ComputeTarget, MetricSample};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Number of trailing samples the summary is computed over.
const SUMMARY_WINDOW: usize = 50;

/// Aggregated view over the trailing sample window
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsReport {
    /// Average duration in milliseconds per mode, integer rounded
    pub summary: BTreeMap<ComputeTarget, u64>,

    /// The samples the summary was computed over, oldest first
    pub last: Vec<MetricSample>,
}

/// Append-only log of per-request metric samples.
#[derive(Debug, Clone)]
pub struct MetricLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl MetricLog {
    /// Create a log over the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one sample
    pub async fn append(&self, sample: &MetricSample) -> Result<()> {
        let _guard = self.lock.lock().await;
        jsonl::append(&self.path, sample).await?;
        debug!(
            mode = %sample.mode,
            duration_ms = sample.duration_ms,
            ok = sample.ok,
            endpoint = %sample.endpoint,
            "recorded metric sample"
        );
        Ok(())
    }

    /// Read every sample in append order
    pub async fn all(&self) -> Result<Vec<MetricSample>> {
        jsonl::read_all(&self.path).await
    }

    /// Average the trailing window of samples per mode
    pub async fn summary(&self) -> Result<MetricsReport> {
        let samples = self.all().await?;
        let start = samples.len().saturating_sub(SUMMARY_WINDOW);
        let last: Vec<MetricSample> = samples[start..].to_vec();

        let mut groups: BTreeMap<ComputeTarget, (u64, u64)> = BTreeMap::new();
        for sample in &last {
            let entry = groups.entry(sample.mode).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += sample.duration_ms;
        }

        let summary = groups
            .into_iter()
            .map(|(mode, (count, total))| {
                let avg = (total as f64 / count as f64).round() as u64;
                (mode, avg)
            })
            .collect();

        Ok(MetricsReport { summary, last })
    }
}
