//! HTTP handler functions for the gateway surface

use crate::admin;
use crate::consult::ConsultChatRequest;
use crate::dispatch::FriendChatRequest;
use crate::server::AppState;
use crate::{GatewayError, Result};
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use gate_core::ComputeTarget;
use gate_store::EndpointUpsert;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Bearer token passthrough from the inbound request
fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

/// Gateway liveness
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// List all registered endpoints
pub async fn list_servers(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let registry = state.registry.get().await?;
    Ok(Json(registry))
}

/// Body of a registry upsert
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpsertServerRequest {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Register or replace an endpoint
pub async fn upsert_server(
    State(state): State<AppState>,
    Json(body): Json<UpsertServerRequest>,
) -> Result<impl IntoResponse> {
    if body.id.is_empty() || body.url.is_empty() {
        return Err(GatewayError::InvalidRequest("missing_id_or_url".to_string()));
    }

    let item = state
        .registry
        .upsert(EndpointUpsert {
            id: body.id,
            url: body.url,
            name: body.name,
            // Unrecognized statuses degrade to unknown
            status: body.status.map(|s| s.parse().unwrap_or_default()),
        })
        .await?;

    Ok(Json(json!({ "ok": true, "item": item })))
}

/// Read the registry change log
pub async fn server_logs(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let logs = state.registry.log().await?;
    Ok(Json(json!({ "logs": logs })))
}

/// Resolve the preferred endpoint, falling back to the configured default URL
pub async fn latest_server(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let item = state.registry.latest().await?;
    let url = item
        .as_ref()
        .map(|record| record.url.clone())
        .unwrap_or_else(|| state.config.upstream.default_gpu_url.clone());
    Ok(Json(json!({ "url": url, "item": item })))
}

/// Body of a health check request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckServerRequest {
    pub url: String,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

/// Probe a candidate endpoint before committing it anywhere
pub async fn check_server(
    State(state): State<AppState>,
    Json(body): Json<CheckServerRequest>,
) -> Result<impl IntoResponse> {
    if body.url.is_empty() {
        return Err(GatewayError::InvalidRequest("missing_url".to_string()));
    }

    let timeout = Duration::from_millis(body.timeout_ms.unwrap_or(state.config.probe.timeout_ms));
    let result = state.prober.probe(&body.url, timeout).await;
    Ok(Json(result))
}

/// Body of a notebook-side endpoint announcement
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ColabUpdateRequest {
    pub id: String,
    pub url: String,
}

/// Refresh an endpoint announced from the notebook side
pub async fn colab_update(
    State(state): State<AppState>,
    Json(body): Json<ColabUpdateRequest>,
) -> Result<impl IntoResponse> {
    if body.id.is_empty() || body.url.is_empty() {
        return Err(GatewayError::InvalidRequest("missing_id_or_url".to_string()));
    }

    let item = state.registry.colab_update(&body.id, &body.url).await?;
    Ok(Json(json!({ "ok": true, "item": item })))
}

/// Current runtime mode, auto-initializing on first read
pub async fn get_mode(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let mode = state.mode.get().await?;
    Ok(Json(mode))
}

/// Body of a mode switch
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetModeRequest {
    pub target: Option<String>,
    pub gpu_url: Option<String>,
}

/// Rewrite the runtime mode, then mirror it to the upstream backend as a
/// detached task whose failure never surfaces.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(body): Json<SetModeRequest>,
) -> Result<impl IntoResponse> {
    // Anything that is not exactly gpu selects cpu
    let target = match body.target.as_deref() {
        Some("gpu") => ComputeTarget::Gpu,
        _ => ComputeTarget::Cpu,
    };

    let mode = state.mode.set(target, body.gpu_url).await?;

    let http = state.http.clone();
    let backend_url = state.config.upstream.backend_url.clone();
    let mirrored = mode.clone();
    tokio::spawn(async move {
        let url = format!("{}/v1/runtime/mode", backend_url.trim_end_matches('/'));
        if let Err(err) = http.post(&url).json(&mirrored).send().await {
            debug!(error = %err, "mode mirror to backend failed");
        }
    });

    Ok(Json(json!({ "ok": true, "mode": mode })))
}

/// Read the runtime event log
pub async fn list_events(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let events = state.events.all().await?;
    Ok(Json(json!({ "events": events })))
}

/// Truncate the runtime event log
pub async fn clear_events(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.events.clear().await?;
    Ok(Json(json!({ "ok": true })))
}

/// Aggregate the trailing metric samples
pub async fn runtime_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let report = state.metrics.summary().await?;
    Ok(Json(report))
}

/// Friend chat, routed with fallback
pub async fn friend_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FriendChatRequest>,
) -> Result<impl IntoResponse> {
    let response = state.dispatcher.friend_chat(body, bearer(&headers)).await?;
    Ok(Json(response))
}

/// Consultation chat, proxied to the local backend
pub async fn consult_chat(
    State(state): State<AppState>,
    Json(body): Json<ConsultChatRequest>,
) -> Result<impl IntoResponse> {
    let response = state.dispatcher.consult_chat(body).await?;
    Ok(Json(response))
}

/// Bulk delete of upstream conversations
pub async fn clear_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let purge = admin::clear_conversations(
        &state.http,
        &state.config.upstream.backend_url,
        bearer(&headers).as_deref(),
    )
    .await?;
    Ok(Json(purge))
}
