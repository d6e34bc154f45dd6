//! # gate-store
//!
//! File-backed stores for the medgate gateway.
//!
//! This crate provides:
//! - Endpoint registry (JSON document plus append-only change log)
//! - Runtime mode singleton document
//! - Append-only runtime event log
//! - Append-only metric sample log with aggregation
//!
//! Every store is a cheap-to-clone handle over shared state. Read-modify-write
//! cycles on the JSON documents are serialized through an internal async mutex,
//! so concurrent handlers in one process cannot lose updates. The JSONL logs
//! are append-only; clearing is an explicit truncate.

pub mod events;
pub mod jsonl;
pub mod metrics;
pub mod mode;
pub mod registry;

// Re-export main types
pub use events::EventLog;
pub use metrics::{MetricLog, MetricsReport};
pub use mode::ModeStore;
pub use registry::{EndpointUpsert, Registry, RegistryStore};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record is missing a required field
    #[error("{0}")]
    InvalidRecord(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_message_is_bare() {
        let err = StoreError::InvalidRecord("missing_id_or_url".to_string());
        assert_eq!(err.to_string(), "missing_id_or_url");
    }
}
