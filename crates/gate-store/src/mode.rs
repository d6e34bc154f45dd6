//! Runtime mode store

use crate::{jsonl, EventLog, Result};
use chrono::Utc;
use gate_core::{ComputeTarget, RuntimeEvent, RuntimeMode};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Durable singleton recording the currently selected compute target.
///
/// Every rewrite also appends a `mode_change` entry to the runtime event log.
#[derive(Debug, Clone)]
pub struct ModeStore {
    path: PathBuf,
    events: EventLog,
    lock: Arc<Mutex<()>>,
}

impl ModeStore {
    /// Create a store over the given document path, logging changes to the
    /// given event log
    pub fn new(path: impl Into<PathBuf>, events: EventLog) -> Self {
        Self {
            path: path.into(),
            events,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return the current mode, initializing the document to `{target: cpu}`
    /// on first read.
    pub async fn get(&self) -> Result<RuntimeMode> {
        let _guard = self.lock.lock().await;

        match self.read_document().await? {
            Some(mode) => Ok(mode),
            None => {
                let mode = RuntimeMode {
                    target: ComputeTarget::Cpu,
                    gpu_url: None,
                    updated_at: Utc::now(),
                };
                self.write_document(&mode).await?;
                Ok(mode)
            }
        }
    }

    /// Return the current mode without initializing the document. The router
    /// needs an absent document to be observable: it defaults the original
    /// target to gpu in that case.
    pub async fn peek(&self) -> Result<Option<RuntimeMode>> {
        let _guard = self.lock.lock().await;
        self.read_document().await
    }

    /// Overwrite the mode wholesale. A `gpu_url` is kept only when the target
    /// is gpu and the value is non-empty; the `mode_change` event is appended
    /// after the document write.
    pub async fn set(&self, target: ComputeTarget, gpu_url: Option<String>) -> Result<RuntimeMode> {
        let gpu_url = match target {
            ComputeTarget::Gpu => gpu_url.filter(|url| !url.trim().is_empty()),
            ComputeTarget::Cpu => None,
        };

        let _guard = self.lock.lock().await;

        let mode = RuntimeMode {
            target,
            gpu_url: gpu_url.clone(),
            updated_at: Utc::now(),
        };
        self.write_document(&mode).await?;
        self.events
            .append(&RuntimeEvent::mode_change(target, gpu_url))
            .await?;

        debug!(%target, gpu_url = ?mode.gpu_url, "runtime mode rewritten");
        Ok(mode)
    }

    async fn read_document(&self) -> Result<Option<RuntimeMode>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, mode: &RuntimeMode) -> Result<()> {
        jsonl::ensure_parent(&self.path).await?;
        let raw = serde_json::to_string_pretty(mode)?;
        fs::write(&self.path, raw).await?;
        Ok(())
    }
}
