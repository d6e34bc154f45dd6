//! # gate-probe
//!
//! Bounded-timeout health probing for candidate backend endpoints.
//!
//! Tunneled dev servers are unreliable and do not always expose a `/health`
//! route, so a probe tries `GET {url}/health` first and falls back to the
//! bare root once. Both attempts share a single timeout budget enforced by
//! cancellation, and every failure collapses to `{ok: false}`; the prober
//! never returns an error to its caller.

use gate_core::TUNNEL_BYPASS_HEADER;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a health probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    /// Whether the endpoint answered with a success status
    pub ok: bool,

    /// Status code of the last attempt that produced a response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Set when no attempt produced a response within the budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn reachable(status: reqwest::StatusCode) -> Self {
        Self {
            ok: status.is_success(),
            status: Some(status.as_u16()),
            error: None,
        }
    }

    fn unreachable() -> Self {
        Self {
            ok: false,
            status: None,
            error: Some("unreachable".to_string()),
        }
    }
}

/// Issues bounded health probes against candidate endpoints
#[derive(Debug, Clone, Default)]
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    /// Create a prober with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prober over an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Probe a base URL within the given timeout budget.
    ///
    /// `GET {url}/health`, then `GET {url}` once if the first attempt came
    /// back non-success. The budget covers both attempts together; when it
    /// fires, whichever request is in flight is cancelled.
    pub async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult {
        let base = url.trim_end_matches('/').to_string();

        let attempts = async {
            let first = self
                .client
                .get(format!("{}/health", base))
                .header(TUNNEL_BYPASS_HEADER, "true")
                .send()
                .await?;
            if first.status().is_success() {
                return Ok::<_, reqwest::Error>(first.status());
            }

            let second = self
                .client
                .get(&base)
                .header(TUNNEL_BYPASS_HEADER, "true")
                .send()
                .await?;
            Ok(second.status())
        };

        match tokio::time::timeout(timeout, attempts).await {
            Ok(Ok(status)) => {
                debug!(url = %base, status = status.as_u16(), "probe completed");
                ProbeResult::reachable(status)
            }
            Ok(Err(err)) => {
                warn!(url = %base, error = %err, "probe failed");
                ProbeResult::unreachable()
            }
            Err(_) => {
                warn!(url = %base, timeout_ms = timeout.as_millis() as u64, "probe timed out");
                ProbeResult::unreachable()
            }
        }
    }
}
