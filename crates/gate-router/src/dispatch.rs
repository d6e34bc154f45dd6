//! Chat dispatch with single gpu to cpu fallback

use crate::resolve::{resolve_target, ResolvedTarget};
use crate::{GatewayError, Result};
use chrono::{DateTime, Utc};
use gate_core::{
    ComputeTarget, Config, MetricSample, RuntimeEvent, MODE_HEADER, TUNNEL_BYPASS_HEADER,
};
use gate_store::{EventLog, MetricLog, ModeStore, RegistryStore};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Logical name of the friend-chat operation in metric samples
pub const FRIEND_CHAT_ENDPOINT: &str = "friend-chat";

/// Completions path appended to a resolved base URL
const FRIEND_CHAT_PATH: &str = "/v1/friend-chat/completions";

/// Persona prompt for the companion-style chat
const FRIEND_SYSTEM_PROMPT: &str = "Bạn là một người bạn thân, nói chuyện đời thường bằng tiếng Việt. \
    Cách nói tự nhiên, gần gũi, có thể hài hước nhẹ, dùng từ ngữ bình dân. Nguyên tắc: ưu tiên lắng nghe \
    và đồng cảm; không giảng đạo lý; không khuyên dạy ngay trừ khi người dùng hỏi rõ; phản hồi giống \
    người thật; có thể hỏi lại 1 câu ngắn để hiểu thêm cảm xúc người nói.";

/// Inbound friend-chat request. Field names accepted as various frontends
/// send them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FriendChatRequest {
    pub message: Option<String>,
    pub prompt: Option<String>,
    pub question: Option<String>,
    #[serde(rename = "conversationHistory")]
    pub conversation_history: Option<Vec<HistoryMessage>>,
    pub messages: Option<Vec<HistoryMessage>>,
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub model: Option<String>,
}

impl FriendChatRequest {
    /// First non-empty of `message`, `prompt`, `question`, trimmed
    pub fn user_message(&self) -> Option<String> {
        [&self.message, &self.prompt, &self.question]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(String::from)
    }

    /// Prior turns, from whichever field the frontend used
    pub fn history(&self) -> &[HistoryMessage] {
        self.conversation_history
            .as_deref()
            .or(self.messages.as_deref())
            .unwrap_or(&[])
    }

    /// Lowercased model selector, defaulting to flash
    pub fn model_id(&self) -> String {
        self.model
            .as_deref()
            .map(|m| m.to_lowercase())
            .unwrap_or_else(|| "flash".to_string())
    }

    /// Model tier forwarded in the mode header
    pub fn tier(&self) -> &'static str {
        if self.model_id() == "pro" {
            "pro"
        } else {
            "flash"
        }
    }
}

/// One prior turn of a conversation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "isUser")]
    pub is_user: Option<bool>,
}

impl HistoryMessage {
    /// Explicit role, or derived from the `isUser` flag
    pub fn role_or_flag(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => {
                if self.is_user == Some(true) {
                    "user"
                } else {
                    "assistant"
                }
            }
        }
    }

    /// Explicit role, or `user`
    pub fn role_or_user(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => "user",
        }
    }
}

/// Response returned to the frontend
#[derive(Debug, Clone, Serialize)]
pub struct FriendChatResponse {
    pub response: String,
    pub metadata: ChatMetadata,
    pub conversation_id: Option<String>,
}

/// Routing metadata attached to a chat response
#[derive(Debug, Clone, Serialize)]
pub struct ChatMetadata {
    pub timestamp: DateTime<Utc>,
    pub mode: ComputeTarget,
    /// True when the request resolved to gpu but was silently served by cpu
    pub fallback: bool,
}

/// Outcome of one upstream attempt
pub(crate) enum Attempt {
    /// The upstream answered with a success status
    Answered(reqwest::Response),
    /// Transport failure or non-success status, with details for the caller
    Failed(String),
}

/// Routes chat requests to the resolved backend and recovers from gpu
/// failures by retrying once against the fixed local target.
#[derive(Debug, Clone)]
pub struct ChatDispatcher {
    pub(crate) config: Arc<Config>,
    pub(crate) http: reqwest::Client,
    pub(crate) registry: RegistryStore,
    pub(crate) mode: ModeStore,
    pub(crate) events: EventLog,
    pub(crate) metrics: MetricLog,
}

impl ChatDispatcher {
    /// Create a dispatcher over the shared stores
    pub fn new(
        config: Arc<Config>,
        http: reqwest::Client,
        registry: RegistryStore,
        mode: ModeStore,
        events: EventLog,
        metrics: MetricLog,
    ) -> Self {
        Self {
            config,
            http,
            registry,
            mode,
            events,
            metrics,
        }
    }

    /// Dispatch a friend-chat request.
    ///
    /// Retry budget is 1 and applies only in the gpu to cpu direction: a cpu
    /// failure, or a parse failure after a successful transport, is terminal.
    pub async fn friend_chat(
        &self,
        request: FriendChatRequest,
        auth: Option<String>,
    ) -> Result<FriendChatResponse> {
        let user_message = request
            .user_message()
            .ok_or_else(|| GatewayError::InvalidRequest("Message is required".to_string()))?;
        let tier = request.tier();
        let payload = build_friend_payload(&request, &user_message);

        let resolved = resolve_target(&self.config, &self.mode, &self.registry).await;
        let target_url = format!("{}{}", resolved.base_url, FRIEND_CHAT_PATH);
        debug!(target = %target_url, mode = %resolved.mode, "dispatching friend chat");

        let start = Instant::now();
        let mut mode_used = resolved.mode;

        let mut attempt = self
            .send(&target_url, &payload, auth.as_deref(), Some(tier), true)
            .await;

        if matches!(attempt, Attempt::Failed(_)) && mode_used == ComputeTarget::Gpu {
            info!(target = %target_url, "gpu dispatch failed, retrying against local fallback");
            mode_used = ComputeTarget::Cpu;
            // Auth carries over; tunnel-bypass and mode headers are dropped
            let retry = self
                .send(
                    &self.config.upstream.cpu_chat_url,
                    &payload,
                    auth.as_deref(),
                    None,
                    false,
                )
                .await;
            if let Attempt::Answered(response) = retry {
                self.record_fallback(&resolved).await;
                attempt = Attempt::Answered(response);
            }
            // A failed retry keeps the primary failure's details
        }

        let response = match attempt {
            Attempt::Answered(response) => response,
            Attempt::Failed(details) => {
                self.record_sample(mode_used, start, false, FRIEND_CHAT_ENDPOINT)
                    .await;
                return Err(GatewayError::Upstream(details));
            }
        };

        let data = match read_json_body(response).await {
            Ok(data) => data,
            Err(details) => {
                self.record_sample(mode_used, start, false, FRIEND_CHAT_ENDPOINT)
                    .await;
                return Err(GatewayError::UpstreamBody(details));
            }
        };

        let content = extract_content(&data);
        self.record_sample(mode_used, start, content.is_some(), FRIEND_CHAT_ENDPOINT)
            .await;

        if mode_used == ComputeTarget::Gpu {
            self.spawn_gpu_metrics_probe(resolved.base_url.clone());
        }

        let content = content.ok_or_else(|| GatewayError::NoContent {
            details: data.to_string(),
        })?;

        let conversation_id = data
            .get("conversation_id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| request.conversation_id.clone());

        Ok(FriendChatResponse {
            response: content,
            metadata: ChatMetadata {
                timestamp: Utc::now(),
                mode: mode_used,
                fallback: resolved.original_target == ComputeTarget::Gpu
                    && mode_used == ComputeTarget::Cpu,
            },
            conversation_id,
        })
    }

    /// POST a JSON payload and classify the outcome. Transport errors and
    /// non-success statuses both count as a failed attempt.
    pub(crate) async fn send(
        &self,
        url: &str,
        payload: &Value,
        auth: Option<&str>,
        tier: Option<&str>,
        tunnel_bypass: bool,
    ) -> Attempt {
        let mut request = self.http.post(url).json(payload);
        if let Some(auth) = auth {
            request = request.header(AUTHORIZATION, auth);
        }
        if tunnel_bypass {
            request = request.header(TUNNEL_BYPASS_HEADER, "true");
        }
        if let Some(tier) = tier {
            request = request.header(MODE_HEADER, tier);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => Attempt::Answered(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(url, status = status.as_u16(), "upstream answered non-success");
                Attempt::Failed(body)
            }
            Err(err) => {
                warn!(url, error = %err, "upstream dispatch failed");
                Attempt::Failed(err.to_string())
            }
        }
    }

    /// Record the silent downgrade: fallback event first, then the mode
    /// rewrite (which appends its own mode_change event). Store failures are
    /// logged and swallowed; the response to the caller is already decided.
    async fn record_fallback(&self, resolved: &ResolvedTarget) {
        debug!(from = %resolved.base_url, "downgrading runtime mode to cpu");
        if let Err(err) = self
            .events
            .append(&RuntimeEvent::fallback(ComputeTarget::Gpu, ComputeTarget::Cpu))
            .await
        {
            warn!(error = %err, "failed to append fallback event");
        }
        if let Err(err) = self.mode.set(ComputeTarget::Cpu, None).await {
            warn!(error = %err, "failed to downgrade mode store");
        }
    }

    /// Append one metric sample for a completed attempt sequence
    pub(crate) async fn record_sample(
        &self,
        mode: ComputeTarget,
        start: Instant,
        ok: bool,
        endpoint: &str,
    ) {
        let sample = MetricSample {
            mode,
            duration_ms: start.elapsed().as_millis() as u64,
            ok,
            ts: Utc::now(),
            endpoint: endpoint.to_string(),
        };
        if let Err(err) = self.metrics.append(&sample).await {
            warn!(error = %err, "failed to record metric sample");
        }
    }

    /// Sample the GPU backend's companion metrics endpoint as a detached
    /// task. Never blocks or fails the response.
    fn spawn_gpu_metrics_probe(&self, base_url: String) {
        let http = self.http.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let url = format!("{}/gpu/metrics", base_url);
            match http.get(&url).header(TUNNEL_BYPASS_HEADER, "true").send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<Value>().await {
                        Ok(data) => {
                            if let Err(err) = events.append(&RuntimeEvent::gpu_metrics(data)).await
                            {
                                debug!(error = %err, "failed to append gpu metrics event");
                            }
                        }
                        Err(err) => debug!(error = %err, "gpu metrics payload unreadable"),
                    }
                }
                Ok(response) => {
                    debug!(status = response.status().as_u16(), "gpu metrics probe non-success")
                }
                Err(err) => debug!(error = %err, "gpu metrics probe failed"),
            }
        });
    }
}

/// Build the upstream completions payload
fn build_friend_payload(request: &FriendChatRequest, user_message: &str) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": FRIEND_SYSTEM_PROMPT })];
    for message in request.history() {
        messages.push(json!({
            "role": message.role_or_flag(),
            "content": message.content.clone().unwrap_or_default(),
        }));
    }
    messages.push(json!({ "role": "user", "content": user_message }));

    json!({
        "model": request.model_id(),
        "mode": request.tier(),
        "messages": messages,
        "conversation_id": request.conversation_id,
        "user_id": request.user_id,
    })
}

/// Read and parse the response body. Empty bodies and malformed JSON are both
/// parse failures, distinct from transport failures and never retried.
pub(crate) async fn read_json_body(
    response: reqwest::Response,
) -> std::result::Result<Value, String> {
    let text = response.text().await.map_err(|err| err.to_string())?;
    if text.trim().is_empty() {
        return Err("Empty response from server".to_string());
    }
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

/// Usable content: the first choice's message content, then the flat
/// `response` field. Empty strings count as absent.
pub(crate) fn extract_content(data: &Value) -> Option<String> {
    data.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .or_else(|| {
            data.get("response")
                .and_then(|response| response.as_str())
                .filter(|response| !response.is_empty())
        })
        .map(String::from)
}
