//! Endpoint registry store

use crate::{jsonl, Result, StoreError};
use chrono::Utc;
use gate_core::{EndpointRecord, EndpointStatus, RegistryLogEntry};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// The registry document as persisted on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    /// All known endpoints
    #[serde(default)]
    pub servers: Vec<EndpointRecord>,
}

/// Input for a registry upsert
#[derive(Debug, Clone)]
pub struct EndpointUpsert {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    pub status: Option<EndpointStatus>,
}

/// Durable mapping of named backend endpoints, persisted as a JSON document
/// with an append-only change log alongside.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    registry_path: PathBuf,
    log_path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl RegistryStore {
    /// Create a store over the given document and log paths
    pub fn new(registry_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            log_path: log_path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return all known endpoints, creating an empty registry document on
    /// first access.
    pub async fn get(&self) -> Result<Registry> {
        let _guard = self.lock.lock().await;

        match self.read_document().await? {
            Some(registry) => Ok(registry),
            None => {
                let registry = Registry::default();
                self.write_document(&registry).await?;
                Ok(registry)
            }
        }
    }

    /// Replace the record with a matching id, or append a new one. Stamps
    /// `updated_at` and appends an `add` or `update` log entry depending on
    /// whether the id pre-existed.
    pub async fn upsert(&self, input: EndpointUpsert) -> Result<EndpointRecord> {
        if input.id.is_empty() || input.url.is_empty() {
            return Err(StoreError::InvalidRecord("missing_id_or_url".to_string()));
        }

        let _guard = self.lock.lock().await;

        let mut registry = self.read_document().await?.unwrap_or_default();
        let now = Utc::now();
        let record = EndpointRecord {
            id: input.id.clone(),
            name: input.name.clone(),
            url: input.url.clone(),
            status: input.status.unwrap_or_default(),
            updated_at: now,
        };

        let entry = match registry.servers.iter_mut().find(|s| s.id == input.id) {
            Some(existing) => {
                *existing = record.clone();
                RegistryLogEntry::Update {
                    id: record.id.clone(),
                    url: record.url.clone(),
                    status: record.status,
                    name: record.name.clone(),
                    ts: now,
                }
            }
            None => {
                registry.servers.push(record.clone());
                RegistryLogEntry::Add {
                    id: record.id.clone(),
                    url: record.url.clone(),
                    status: record.status,
                    name: record.name.clone(),
                    ts: now,
                }
            }
        };

        self.write_document(&registry).await?;
        jsonl::append(&self.log_path, &entry).await?;

        debug!(id = %record.id, url = %record.url, "upserted registry endpoint");
        Ok(record)
    }

    /// Refresh an endpoint announced from the notebook side: merges into the
    /// existing record (keeping its display name), forces the status to
    /// active, and logs a `colab_update` entry.
    pub async fn colab_update(&self, id: &str, url: &str) -> Result<EndpointRecord> {
        if id.is_empty() || url.is_empty() {
            return Err(StoreError::InvalidRecord("missing_id_or_url".to_string()));
        }

        let _guard = self.lock.lock().await;

        let mut registry = self.read_document().await?.unwrap_or_default();
        let now = Utc::now();

        let record = match registry.servers.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.url = url.to_string();
                existing.status = EndpointStatus::Active;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let record = EndpointRecord {
                    id: id.to_string(),
                    name: None,
                    url: url.to_string(),
                    status: EndpointStatus::Active,
                    updated_at: now,
                };
                registry.servers.push(record.clone());
                record
            }
        };

        self.write_document(&registry).await?;
        jsonl::append(
            &self.log_path,
            &RegistryLogEntry::ColabUpdate {
                id: id.to_string(),
                url: url.to_string(),
                ts: now,
            },
        )
        .await?;

        debug!(id, url, "refreshed registry endpoint from announcer");
        Ok(record)
    }

    /// Resolve the preferred endpoint: any active endpoint beats the rest,
    /// and within the candidate set the most recently updated wins. Returns
    /// `None` when the registry is absent or empty. Does not create the
    /// document.
    pub async fn latest(&self) -> Result<Option<EndpointRecord>> {
        let registry = match self.read_document().await? {
            Some(registry) => registry,
            None => return Ok(None),
        };
        Ok(pick_latest(&registry.servers).cloned())
    }

    /// Read the registry change log
    pub async fn log(&self) -> Result<Vec<RegistryLogEntry>> {
        jsonl::read_all(&self.log_path).await
    }

    async fn read_document(&self) -> Result<Option<Registry>> {
        match fs::read_to_string(&self.registry_path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, registry: &Registry) -> Result<()> {
        jsonl::ensure_parent(&self.registry_path).await?;
        let raw = serde_json::to_string_pretty(registry)?;
        fs::write(&self.registry_path, raw).await?;
        Ok(())
    }
}

/// Selection rule shared by `latest()` and the request router: prefer active
/// endpoints, then pick the most recent `updated_at`.
pub fn pick_latest(servers: &[EndpointRecord]) -> Option<&EndpointRecord> {
    let active: Vec<&EndpointRecord> = servers
        .iter()
        .filter(|s| s.status == EndpointStatus::Active)
        .collect();

    let pool = if active.is_empty() {
        servers.iter().collect()
    } else {
        active
    };

    pool.into_iter().max_by_key(|s| s.updated_at)
}
