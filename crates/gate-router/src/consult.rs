//! Consultation chat proxied to the local backend
//!
//! Unlike friend chat this route always targets the internal completions URL,
//! so there is no target resolution and no fallback; the local backend is the
//! fallback.

use crate::dispatch::{
    extract_content, read_json_body, Attempt, ChatDispatcher, HistoryMessage,
};
use crate::{GatewayError, Result};
use chrono::{DateTime, Utc};
use gate_core::ComputeTarget;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::debug;

/// Logical name of the consultation-chat operation in metric samples
pub const CONSULT_ENDPOINT: &str = "consult-chat";

/// Keywords steering the conversation toward psychological support
const PSYCH_KEYWORDS: [&str; 6] = [
    "tâm lý",
    "stress",
    "lo âu",
    "trầm cảm",
    "tâm trạng",
    "cảm xúc",
];

/// Keywords steering the conversation toward information lookup
const LOOKUP_KEYWORDS: [&str; 6] = [
    "tra cứu",
    "thông tin",
    "bệnh",
    "thuốc",
    "triệu chứng",
    "chẩn đoán",
];

/// Pick a consultation context from the user's wording
pub fn determine_context(message: &str) -> &'static str {
    let message = message.to_lowercase();

    if PSYCH_KEYWORDS.iter().any(|k| message.contains(k)) {
        return "psychological support";
    }
    if LOOKUP_KEYWORDS.iter().any(|k| message.contains(k)) {
        return "health lookup";
    }
    "health consultation"
}

/// Inbound consultation-chat request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsultChatRequest {
    pub prompt: Option<String>,
    pub context: Option<String>,
    pub question: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "conversationHistory")]
    pub conversation_history: Option<Vec<HistoryMessage>>,
}

impl ConsultChatRequest {
    /// First non-empty of `message`, `question`, `prompt`, trimmed
    pub fn user_message(&self) -> Option<String> {
        [&self.message, &self.question, &self.prompt]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(String::from)
    }
}

/// Response returned to the frontend
#[derive(Debug, Clone, Serialize)]
pub struct ConsultChatResponse {
    pub response: String,
    pub context: String,
    pub model_info: ModelInfo,
    pub metadata: ConsultMetadata,
}

/// Static description of the serving model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_name: &'static str,
    pub provider: &'static str,
}

/// Metadata attached to a consultation response
#[derive(Debug, Clone, Serialize)]
pub struct ConsultMetadata {
    pub context: String,
    pub prompt_length: usize,
    pub response_length: usize,
    pub timestamp: DateTime<Utc>,
}

impl ChatDispatcher {
    /// Dispatch a consultation-chat request against the internal backend.
    pub async fn consult_chat(&self, request: ConsultChatRequest) -> Result<ConsultChatResponse> {
        let user_message = request
            .user_message()
            .ok_or_else(|| GatewayError::InvalidRequest("Message is required".to_string()))?;

        let context = request
            .context
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| determine_context(&user_message).to_string());

        let system_prompt = format!(
            "You are a medical consultation assistant. Provide helpful, safe, and culturally \
             appropriate answers in Vietnamese. Context: {}",
            context
        );

        let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
        for message in request.conversation_history.as_deref().unwrap_or(&[]) {
            messages.push(json!({
                "role": message.role_or_user(),
                "content": message.content.clone().unwrap_or_default(),
            }));
        }
        messages.push(json!({ "role": "user", "content": user_message }));

        let payload = json!({
            "model": "local-llama",
            "messages": messages,
            "max_tokens": 1024,
            "temperature": 0.7,
        });

        let url = self.config.upstream.internal_llm_url.clone();
        let mode = ComputeTarget::classify(&url);
        debug!(target = %url, %context, "dispatching consultation chat");

        let start = Instant::now();
        let response = match self.send(&url, &payload, None, None, false).await {
            Attempt::Answered(response) => response,
            Attempt::Failed(details) => {
                self.record_sample(mode, start, false, CONSULT_ENDPOINT).await;
                return Err(GatewayError::Upstream(details));
            }
        };

        let data = match read_json_body(response).await {
            Ok(data) => data,
            Err(details) => {
                self.record_sample(mode, start, false, CONSULT_ENDPOINT).await;
                return Err(GatewayError::UpstreamBody(details));
            }
        };

        let content = extract_content(&data);
        self.record_sample(mode, start, content.is_some(), CONSULT_ENDPOINT)
            .await;

        let content = content.ok_or_else(|| GatewayError::NoContent {
            details: data.to_string(),
        })?;

        Ok(ConsultChatResponse {
            context: context.clone(),
            model_info: ModelInfo {
                model_name: "local-llama-compatible",
                provider: "Internal FastAPI",
            },
            metadata: ConsultMetadata {
                context,
                prompt_length: user_message.chars().count(),
                response_length: content.chars().count(),
                timestamp: Utc::now(),
            },
            response: content,
        })
    }
}
