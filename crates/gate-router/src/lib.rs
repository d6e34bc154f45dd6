//! # gate-router
//!
//! Request routing and HTTP surface for the medgate gateway.
//!
//! This crate provides:
//! - Target resolution over the mode and registry stores
//! - Chat dispatch with single gpu to cpu fallback
//! - The admin/status HTTP surface (axum)
//! - The `medgated` daemon binary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gate_store::StoreError;
use serde_json::json;

pub mod admin;
pub mod consult;
pub mod dispatch;
pub mod handlers;
pub mod resolve;
pub mod server;

// Re-export main types
pub use dispatch::{ChatDispatcher, FriendChatRequest, FriendChatResponse};
pub use server::GatewayServer;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while serving gateway requests
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The inbound request is missing a required field
    #[error("{0}")]
    InvalidRequest(String),

    /// Every dispatch attempt failed or came back non-success
    #[error("LLM server error: {0}")]
    Upstream(String),

    /// The upstream answered but its body was empty or not JSON
    #[error("Invalid JSON response from server: {0}")]
    UpstreamBody(String),

    /// The upstream answered with JSON carrying no usable content
    #[error("No content in response")]
    NoContent { details: String },

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Convert to HTTP status code
    pub fn to_status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::Upstream(_) => 502,
            GatewayError::UpstreamBody(_) => 502,
            GatewayError::NoContent { .. } => 502,
            GatewayError::Store(StoreError::InvalidRecord(_)) => 400,
            GatewayError::Store(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.to_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match self {
            GatewayError::InvalidRequest(message) => json!({ "error": message }),
            GatewayError::Upstream(details) => {
                json!({ "error": "LLM server error", "details": details })
            }
            GatewayError::UpstreamBody(details) => {
                json!({ "error": "Invalid JSON response from server", "details": details })
            }
            GatewayError::NoContent { details } => {
                json!({ "error": "No content in response", "details": details })
            }
            GatewayError::Store(StoreError::InvalidRecord(message)) => {
                json!({ "error": message })
            }
            GatewayError::Store(err) => {
                json!({ "error": "Internal server error", "details": err.to_string() })
            }
            GatewayError::Internal(details) => {
                json!({ "error": "Internal server error", "details": details })
            }
        };

        (status, Json(body)).into_response()
    }
}
