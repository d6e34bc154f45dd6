//! HTTP client for the gateway API

use anyhow::{Context, Result};
use gate_core::{EndpointRecord, MetricSample, RegistryLogEntry, RuntimeEvent, RuntimeMode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Response of `GET /servers`
#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<EndpointRecord>,
}

/// Response of mutating registry calls
#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: EndpointRecord,
}

/// Response of `GET /servers/logs`
#[derive(Debug, Deserialize)]
struct LogsResponse {
    logs: Vec<RegistryLogEntry>,
}

/// Response of `GET /servers/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct LatestResponse {
    pub url: String,
    pub item: Option<EndpointRecord>,
}

/// Response of `POST /servers/check`
#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    pub ok: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Response of `POST /runtime/mode`
#[derive(Debug, Deserialize)]
struct ModeResponse {
    mode: RuntimeMode,
}

/// Response of `GET /runtime/events`
#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<RuntimeEvent>,
}

/// Response of `GET /runtime/metrics`
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsResponse {
    pub summary: BTreeMap<String, u64>,
    pub last: Vec<MetricSample>,
}

/// Client for the gateway control surface
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Create a new client against the given endpoint
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// The gateway endpoint this client talks to
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List all registered endpoints
    pub async fn list_servers(&self) -> Result<Vec<EndpointRecord>> {
        debug!("listing registered endpoints");
        let response: ServersResponse = self
            .http
            .get(self.url("/servers"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed servers response")?;
        Ok(response.servers)
    }

    /// Register or replace an endpoint
    pub async fn add_server(
        &self,
        id: &str,
        url: &str,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Result<EndpointRecord> {
        let response: ItemResponse = self
            .http
            .post(self.url("/servers"))
            .json(&json!({ "id": id, "url": url, "name": name, "status": status }))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed upsert response")?;
        Ok(response.item)
    }

    /// Read the registry change log
    pub async fn server_logs(&self) -> Result<Vec<RegistryLogEntry>> {
        let response: LogsResponse = self
            .http
            .get(self.url("/servers/logs"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed logs response")?;
        Ok(response.logs)
    }

    /// Resolve the preferred endpoint
    pub async fn latest(&self) -> Result<LatestResponse> {
        self.http
            .get(self.url("/servers/latest"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed latest response")
    }

    /// Probe a candidate endpoint through the gateway
    pub async fn check(&self, url: &str, timeout_ms: u64) -> Result<CheckResponse> {
        self.http
            .post(self.url("/servers/check"))
            .json(&json!({ "url": url, "timeoutMs": timeout_ms }))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed check response")
    }

    /// Current runtime mode
    pub async fn mode(&self) -> Result<RuntimeMode> {
        self.http
            .get(self.url("/runtime/mode"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed mode response")
    }

    /// Switch the runtime mode
    pub async fn set_mode(&self, target: &str, gpu_url: Option<&str>) -> Result<RuntimeMode> {
        let response: ModeResponse = self
            .http
            .post(self.url("/runtime/mode"))
            .json(&json!({ "target": target, "gpu_url": gpu_url }))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed mode response")?;
        Ok(response.mode)
    }

    /// Read the runtime event log
    pub async fn events(&self) -> Result<Vec<RuntimeEvent>> {
        let response: EventsResponse = self
            .http
            .get(self.url("/runtime/events"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed events response")?;
        Ok(response.events)
    }

    /// Truncate the runtime event log
    pub async fn clear_events(&self) -> Result<()> {
        self.http
            .delete(self.url("/runtime/events"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?;
        Ok(())
    }

    /// Aggregate the trailing metric samples
    pub async fn metrics(&self) -> Result<MetricsResponse> {
        self.http
            .get(self.url("/runtime/metrics"))
            .send()
            .await
            .context("Failed to reach the gateway")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed metrics response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_is_normalized() {
        let client =
            GatewayClient::new("http://127.0.0.1:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080");
        assert_eq!(client.url("/servers"), "http://127.0.0.1:8080/servers");
    }

    #[tokio::test]
    async fn test_list_servers_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{
                    "id": "colab-ngrok",
                    "url": "https://x.ngrok-free.dev",
                    "status": "active",
                    "updated_at": "2026-08-07T10:00:00Z"
                }]
            })))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let servers = client.list_servers().await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, "colab-ngrok");
    }

    #[tokio::test]
    async fn test_set_mode_posts_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runtime/mode"))
            .and(body_partial_json(json!({ "target": "gpu" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "mode": {
                    "target": "gpu",
                    "gpu_url": "https://x.ngrok-free.dev",
                    "updated_at": "2026-08-07T10:00:00Z"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let mode = client
            .set_mode("gpu", Some("https://x.ngrok-free.dev"))
            .await
            .unwrap();
        assert_eq!(mode.gpu_url.as_deref(), Some("https://x.ngrok-free.dev"));
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(client.list_servers().await.is_err());
    }
}
