//! Admin bulk operations against the upstream backend

use crate::{GatewayError, Result};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Outcome of a conversation purge
#[derive(Debug, Clone, Serialize)]
pub struct ConversationPurge {
    pub ok: bool,
    pub deleted: u32,
    pub failed: u32,
}

/// Delete every conversation the upstream backend knows about.
///
/// Lists conversation ids from the backend, then deletes them one by one
/// through the backend's own delete endpoint. Individual failures are counted
/// and skipped, not aborted on.
pub async fn clear_conversations(
    http: &reqwest::Client,
    backend_url: &str,
    auth: Option<&str>,
) -> Result<ConversationPurge> {
    let base = backend_url.trim_end_matches('/');

    let mut request = http.get(format!("{}/v1/conversations", base));
    if let Some(auth) = auth {
        request = request.header(AUTHORIZATION, auth);
    }
    let response = request
        .send()
        .await
        .map_err(|err| GatewayError::Upstream(err.to_string()))?;
    if !response.status().is_success() {
        return Err(GatewayError::Upstream(format!(
            "conversation list returned {}",
            response.status()
        )));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|err| GatewayError::UpstreamBody(err.to_string()))?;
    let ids: Vec<String> = data
        .get("conversations")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let mut deleted = 0;
    let mut failed = 0;
    for id in &ids {
        let mut request = http.delete(format!("{}/v1/conversations/{}", base, id));
        if let Some(auth) = auth {
            request = request.header(AUTHORIZATION, auth);
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => deleted += 1,
            Ok(response) => {
                warn!(id, status = response.status().as_u16(), "conversation delete refused");
                failed += 1;
            }
            Err(err) => {
                warn!(id, error = %err, "conversation delete failed");
                failed += 1;
            }
        }
    }

    info!(deleted, failed, "conversation purge finished");
    Ok(ConversationPurge {
        ok: failed == 0,
        deleted,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_purge_deletes_each_listed_conversation() {
        let backend = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [{ "id": "a" }, { "id": "b" }]
            })))
            .expect(1)
            .mount(&backend)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/conversations/a"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&backend)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/conversations/b"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&backend)
            .await;

        let purge = clear_conversations(&reqwest::Client::new(), &backend.uri(), None)
            .await
            .unwrap();
        assert!(purge.ok);
        assert_eq!(purge.deleted, 2);
        assert_eq!(purge.failed, 0);
    }

    #[tokio::test]
    async fn test_purge_continues_past_individual_failures() {
        let backend = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [{ "id": "a" }, { "id": "b" }]
            })))
            .mount(&backend)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/conversations/a"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&backend)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/conversations/b"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&backend)
            .await;

        let purge = clear_conversations(&reqwest::Client::new(), &backend.uri(), None)
            .await
            .unwrap();
        assert!(!purge.ok);
        assert_eq!(purge.deleted, 1);
        assert_eq!(purge.failed, 1);
    }

    #[tokio::test]
    async fn test_purge_surfaces_list_failure() {
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/conversations"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&backend)
            .await;

        let err = clear_conversations(&reqwest::Client::new(), &backend.uri(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
    }
}
