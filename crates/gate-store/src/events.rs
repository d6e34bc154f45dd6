//! Append-only runtime event log

use crate::{jsonl, Result};
use gate_core::RuntimeEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Append-only record of mode changes, fallbacks, and GPU telemetry samples.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl EventLog {
    /// Create a log over the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one event
    pub async fn append(&self, event: &RuntimeEvent) -> Result<()> {
        let _guard = self.lock.lock().await;
        jsonl::append(&self.path, event).await?;
        debug!(event = ?event, "appended runtime event");
        Ok(())
    }

    /// Read all events in append order
    pub async fn all(&self) -> Result<Vec<RuntimeEvent>> {
        jsonl::read_all(&self.path).await
    }

    /// Truncate the log. Prior entries are gone for good; subsequent appends
    /// start a fresh sequence.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        jsonl::truncate(&self.path).await
    }
}
