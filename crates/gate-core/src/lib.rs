//! # gate-core
//!
//! Core types, traits, and utilities for medgate - a compute runtime gateway
//! for the medical consultation service.
//!
//! This crate provides the foundational data structures shared across all
//! other medgate components. It includes:
//!
//! - Compute target and endpoint types used by routing decisions
//! - Runtime mode, event, and metric sample records
//! - Configuration schema and layered loading
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{Config, DataConfig, LoggingConfig, ProbeConfig, ServerConfig, UpstreamConfig};
pub use error::{Error, Result};
pub use types::{
    ComputeTarget, EndpointRecord, EndpointStatus, MetricSample, RegistryLogEntry, RuntimeEvent,
    RuntimeMode,
};

/// Header used to bypass the interstitial page on tunneled dev servers.
pub const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Header carrying the model tier indicator to the upstream backend.
pub const MODE_HEADER: &str = "X-Mode";
