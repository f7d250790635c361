//! Suggestion-backend provider.
//!
//! Talks to a conversation-suggestion service (such as `feedreply serve`)
//! instead of a model API: the raw inbound message and the scenario context
//! go out, a single suggested reply comes back.
//!
//! ```text
//! POST {base}/api/conversation-suggest
//! {"message": "...", "context": {"scenario": "general"}}
//!   -> {"success": true, "data": {"suggestion": "...", ...}}
//! ```

use async_trait::async_trait;
use feedreply_core::error::GenerationError;
use feedreply_core::message::Message;
use feedreply_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::openai_compat::check_status;

/// Scenario context sent alongside every suggestion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_goal: Option<String>,
}

/// Body of `POST /api/conversation-suggest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: SuggestContext,
}

/// A structured suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_confidence() -> f64 {
    0.8
}

/// Envelope returned by the suggestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Provider backed by a suggestion service.
pub struct SuggestBackendProvider {
    base_url: String,
    context: SuggestContext,
    client: reqwest::Client,
}

impl SuggestBackendProvider {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            context: SuggestContext::default(),
            client,
        }
    }

    /// Context attached to every request.
    pub fn with_context(mut self, context: SuggestContext) -> Self {
        self.context = context;
        self
    }
}

#[async_trait]
impl Provider for SuggestBackendProvider {
    fn name(&self) -> &str {
        "backend"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        let message = request
            .subject_or_last_user()
            .ok_or_else(|| GenerationError::MalformedResponse("request has no user message".into()))?
            .to_string();

        let url = format!("{}/api/conversation-suggest", self.base_url);
        let body = SuggestRequest {
            message,
            context: self.context.clone(),
        };

        debug!(url = %url, scenario = ?self.context.scenario, "Requesting suggestion");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(e.to_string())
            } else {
                GenerationError::Network(e.to_string())
            }
        })?;

        let response = check_status(response).await?;

        let envelope: SuggestResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(format!("bad suggestion body: {e}")))?;

        if !envelope.success {
            return Err(GenerationError::ApiError {
                status_code: 200,
                message: envelope.error.unwrap_or_else(|| "backend reported failure".into()),
            });
        }

        let suggestion = envelope
            .data
            .map(|d| d.suggestion)
            .filter(|s| !s.trim().is_empty())
            .ok_or(GenerationError::EmptyReply)?;

        Ok(ProviderResponse {
            message: Message::assistant(suggestion),
            usage: None,
            model: request.model,
        })
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use std::time::Duration;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn context_omits_unset_fields() {
        let ctx = SuggestContext {
            scenario: Some("general".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"scenario": "general"}));
    }

    #[test]
    fn suggestion_defaults() {
        let s: Suggestion = serde_json::from_str(r#"{"suggestion":"hi"}"#).unwrap();
        assert!(s.tips.is_empty());
        assert!((s.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn returns_the_suggestion_for_the_raw_subject() {
        let router = Router::new().route(
            "/api/conversation-suggest",
            post(|Json(req): Json<SuggestRequest>| async move {
                Json(serde_json::json!({
                    "success": true,
                    "data": {
                        "suggestion": format!("re: {} ({})", req.message, req.context.scenario.unwrap_or_default()),
                        "analysis": "",
                        "tips": [],
                        "confidence": 0.9
                    }
                }))
            }),
        );
        let base = spawn_backend(router).await;

        let provider = SuggestBackendProvider::new(base, Duration::from_secs(5)).with_context(
            SuggestContext {
                scenario: Some("social".into()),
                ..Default::default()
            },
        );
        let mut req = ProviderRequest::new("m", vec![Message::user("对方说：你好\n\n请简洁回复：")]);
        req.subject = Some("你好".into());

        let resp = provider.complete(req).await.unwrap();
        assert_eq!(resp.message.content, "re: 你好 (social)");
    }

    #[tokio::test]
    async fn failure_envelope_is_an_api_error() {
        let router = Router::new().route(
            "/api/conversation-suggest",
            post(|| async { Json(serde_json::json!({"success": false, "error": "quota"})) }),
        );
        let base = spawn_backend(router).await;
        let provider = SuggestBackendProvider::new(base, Duration::from_secs(5));
        let err = provider
            .complete(ProviderRequest::new("m", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let router = Router::new().route(
            "/api/conversation-suggest",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_backend(router).await;
        let provider = SuggestBackendProvider::new(base, Duration::from_secs(5));
        let err = provider
            .complete(ProviderRequest::new("m", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ApiError { status_code: 500, .. }));
        assert!(err.is_transient());
    }
}
