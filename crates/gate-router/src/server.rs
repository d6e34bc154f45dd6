//! Gateway HTTP server

use crate::dispatch::ChatDispatcher;
use crate::handlers;
use crate::{GatewayError, Result};
use axum::routing::{get, post};
use axum::Router;
use gate_core::Config;
use gate_probe::HealthProber;
use gate_store::{EventLog, MetricLog, ModeStore, RegistryStore};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: RegistryStore,
    pub mode: ModeStore,
    pub events: EventLog,
    pub metrics: MetricLog,
    pub prober: HealthProber,
    pub dispatcher: ChatDispatcher,
    pub http: reqwest::Client,
    pub started_at: Instant,
}

/// The gateway server, wiring stores, prober, and dispatcher into the HTTP
/// surface.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    /// Assemble stores and services from the configuration
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let http = reqwest::Client::new();

        let events = EventLog::new(config.events_path());
        let mode = ModeStore::new(config.mode_path(), events.clone());
        let registry = RegistryStore::new(config.registry_path(), config.registry_log_path());
        let metrics = MetricLog::new(config.metrics_path());
        let prober = HealthProber::with_client(http.clone());
        let dispatcher = ChatDispatcher::new(
            config.clone(),
            http.clone(),
            registry.clone(),
            mode.clone(),
            events.clone(),
            metrics.clone(),
        );

        let state = AppState {
            config,
            registry,
            mode,
            events,
            metrics,
            prober,
            dispatcher,
            http,
            started_at: Instant::now(),
        };

        Self { state }
    }

    /// Build the axum router with all routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/servers",
                get(handlers::list_servers).post(handlers::upsert_server),
            )
            .route("/servers/logs", get(handlers::server_logs))
            .route("/servers/latest", get(handlers::latest_server))
            .route("/servers/check", post(handlers::check_server))
            .route("/servers/colab-update", post(handlers::colab_update))
            .route(
                "/runtime/mode",
                get(handlers::get_mode).post(handlers::set_mode),
            )
            .route(
                "/runtime/events",
                get(handlers::list_events).delete(handlers::clear_events),
            )
            .route("/runtime/metrics", get(handlers::runtime_metrics))
            .route("/chat/friend", post(handlers::friend_chat))
            .route("/chat/consult", post(handlers::consult_chat))
            .route(
                "/admin/conversations/clear",
                post(handlers::clear_conversations),
            )
            .with_state(self.state.clone())
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .layer(CorsLayer::permissive())
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let bind_addr = self.state.config.http_bind_addr();
        info!("Starting gateway on {}", bind_addr);

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|err| {
                GatewayError::Internal(format!("Failed to bind to {}: {}", bind_addr, err))
            })?;

        if let Err(err) = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("HTTP server error: {}", err);
            return Err(GatewayError::Internal(format!("HTTP server failed: {}", err)));
        }

        info!("Gateway shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use gate_core::DataConfig;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router(dir: &tempfile::TempDir) -> Router {
        let mut config = Config::default();
        config.data = DataConfig::with_dir(dir.path());
        GatewayServer::new(config).router()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_upsert_requires_id_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .oneshot(post_json("/servers", json!({ "id": "colab-ngrok" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing_id_or_url");
    }

    #[tokio::test]
    async fn test_latest_empty_registry_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app.oneshot(get("/servers/latest")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["url"],
            "https://elissa-villous-scourgingly.ngrok-free.dev"
        );
        assert!(body["item"].is_null());
    }

    #[tokio::test]
    async fn test_register_then_latest_returns_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .clone()
            .oneshot(post_json(
                "/servers",
                json!({
                    "id": "colab-ngrok",
                    "url": "https://x.ngrok-free.dev",
                    "status": "active"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["item"]["id"], "colab-ngrok");

        let response = app.oneshot(get("/servers/latest")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["url"], "https://x.ngrok-free.dev");
        assert_eq!(body["item"]["status"], "active");
    }

    #[tokio::test]
    async fn test_mode_roundtrip_and_event() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .clone()
            .oneshot(post_json(
                "/runtime/mode",
                json!({ "target": "gpu", "gpu_url": "https://x.ngrok-free.dev" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"]["target"], "gpu");
        assert_eq!(body["mode"]["gpu_url"], "https://x.ngrok-free.dev");

        let response = app.clone().oneshot(get("/runtime/mode")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["target"], "gpu");
        assert_eq!(body["gpu_url"], "https://x.ngrok-free.dev");

        let response = app.oneshot(get("/runtime/events")).await.unwrap();
        let body = body_json(response).await;
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "mode_change");
        assert_eq!(events[0]["target"], "gpu");
    }

    #[tokio::test]
    async fn test_invalid_mode_target_defaults_to_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .oneshot(post_json("/runtime/mode", json!({ "target": "tpu" })))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["mode"]["target"], "cpu");
    }

    #[tokio::test]
    async fn test_get_mode_auto_initializes() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app.oneshot(get("/runtime/mode")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["target"], "cpu");
    }

    #[tokio::test]
    async fn test_clear_events_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        app.clone()
            .oneshot(post_json("/runtime/mode", json!({ "target": "gpu" })))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/runtime/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/runtime/events")).await.unwrap();
        let body = body_json(response).await;
        assert!(body["events"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .oneshot(post_json("/servers/check", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing_url");
    }

    #[tokio::test]
    async fn test_check_unreachable_endpoint_is_ok_false() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .oneshot(post_json(
                "/servers/check",
                json!({ "url": "http://127.0.0.1:9", "timeoutMs": 300 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "unreachable");
    }

    #[tokio::test]
    async fn test_colab_update_upserts_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .clone()
            .oneshot(post_json(
                "/servers/colab-update",
                json!({ "id": "colab-ngrok", "url": "https://fresh.ngrok-free.dev" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["item"]["status"], "active");

        let response = app.oneshot(get("/servers/logs")).await.unwrap();
        let body = body_json(response).await;
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["type"], "colab_update");
    }

    #[tokio::test]
    async fn test_friend_chat_requires_message() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app
            .oneshot(post_json("/chat/friend", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Message is required");
    }

    #[tokio::test]
    async fn test_metrics_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir);

        let response = app.oneshot(get("/runtime/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["last"].as_array().unwrap().is_empty());
    }
}
