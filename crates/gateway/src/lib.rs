//! HTTP front-end for feedreply.
//!
//! Exposes a health check, the conversation-suggestion endpoint used by
//! `SuggestBackendProvider`, the scenario catalogue, recent suggestion
//! history, and messaging-platform webhook verification.
//!
//! Built on Axum.

pub mod suggest;
pub mod webhook;

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use feedreply_agent::ReplyGenerator;
use feedreply_config::AppConfig;
use feedreply_core::provider::Provider;
use feedreply_providers::OpenAiCompatProvider;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use suggest::HistoryEntry;

/// Most history entries kept in memory.
const HISTORY_CAPACITY: usize = 100;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub generator: ReplyGenerator,
    pub verify_token: Option<String>,
    pub app_secret: Option<String>,
    pub history: RwLock<VecDeque<HistoryEntry>>,
}

impl GatewayState {
    pub fn new(generator: ReplyGenerator) -> Self {
        Self {
            generator,
            verify_token: None,
            app_secret: None,
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub fn with_verify_token(mut self, token: Option<String>) -> Self {
        self.verify_token = token;
        self
    }

    pub fn with_app_secret(mut self, secret: Option<String>) -> Self {
        self.app_secret = secret;
        self
    }

    /// Append to the history, dropping the oldest entries past capacity.
    pub async fn remember(&self, entries: impl IntoIterator<Item = HistoryEntry>) {
        let mut history = self.history.write().await;
        history.extend(entries);
        while history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - permissive CORS (the endpoints are called from companion apps)
/// - request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/api/conversation-suggest", post(suggest::suggest_handler))
        .route("/api/scenarios", get(suggest::scenarios_handler))
        .route(
            "/api/conversation-history",
            get(suggest::history_handler).delete(suggest::clear_history_handler),
        )
        .route("/api/test", post(suggest::test_handler))
        .route(
            "/webhook",
            get(webhook::verify_handler).post(webhook::receive_handler),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// The provider that answers suggestion requests.
///
/// The `backend` provider would post back to this very server, so the
/// gateway falls back to the OpenAI-compatible provider in that case.
pub fn gateway_provider(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let router = feedreply_providers::build_from_config(config);
    if config.default_provider != "backend" {
        return router.default();
    }
    router.get("openai").or_else(|| {
        config
            .api_key
            .as_ref()
            .map(|key| Arc::new(OpenAiCompatProvider::openai(key.clone())) as Arc<dyn Provider>)
    })
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = gateway_provider(&config)
        .ok_or("No generation provider configured for the gateway; set an API key")?;
    let generator = ReplyGenerator::from_config(provider, &config).with_stream(false);

    let state = Arc::new(
        GatewayState::new(generator)
            .with_verify_token(config.gateway.verify_token.clone())
            .with_app_secret(config.gateway.app_secret.clone()),
    );
    let app = build_router(state);

    info!(addr = %addr, provider = %config.default_provider, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        service: "feedreply",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn health_endpoint() {
        for uri in ["/", "/health"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, json) = send(test_state(), req).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["status"], "running");
            assert_eq!(json["service"], "feedreply");
            assert!(json["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let state = test_state();
        let entries = (0..150).map(|i| HistoryEntry::user(format!("m{i}")));
        state.remember(entries).await;
        let history = state.history.read().await;
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.front().unwrap().content, "m50");
    }

    #[test]
    fn backend_default_falls_back_to_openai() {
        let config = AppConfig {
            default_provider: "backend".into(),
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = gateway_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn direct_default_is_used() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert_eq!(gateway_provider(&config).unwrap().name(), "openai");
    }
}
